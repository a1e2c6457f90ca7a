use anyhow::{Context, Result};
use rand::Rng;
use std::io::Write;
use std::path::PathBuf;
use std::str::FromStr;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::warn;

use crate::cache::SpeechCache;
use crate::elevenlabs::ElevenLabsClient;
use crate::persona::Persona;
use crate::session::ChatSession;
use crate::speech;

const HELP: &str = "\
Commands:
  /mode <therapist|career|narrator|neutral>  switch persona
  /history                                   show the conversation so far
  /clear                                     forget the conversation
  /note [mood:<mood>] <text>                 save a session note
  /notes                                     list saved notes
  /forget <id>                               delete a note
  /export <path>                             write notes to a file
  /quit                                      leave";

#[derive(Debug, PartialEq, Eq)]
pub enum Input<'a> {
    Say(&'a str),
    Mode(Persona),
    History,
    Clear,
    Note { mood: Option<&'a str>, text: &'a str },
    Notes,
    Forget(u64),
    Export(&'a str),
    Help,
    Quit,
    Empty,
    Invalid(String),
}

pub fn parse(line: &str) -> Input<'_> {
    let line = line.trim();
    if line.is_empty() {
        return Input::Empty;
    }
    let Some(command) = line.strip_prefix('/') else {
        return Input::Say(line);
    };

    let (name, rest) = command
        .split_once(char::is_whitespace)
        .map(|(name, rest)| (name, rest.trim()))
        .unwrap_or((command, ""));

    match name {
        "mode" => Persona::from_str(rest)
            .map(Input::Mode)
            .unwrap_or_else(|_| Input::Invalid(format!("Unknown persona `{rest}`"))),
        "history" => Input::History,
        "clear" => Input::Clear,
        "note" => match rest.strip_prefix("mood:") {
            Some(tagged) => {
                let (mood, text) = tagged
                    .split_once(char::is_whitespace)
                    .unwrap_or((tagged, ""));
                Input::Note {
                    mood: Some(mood),
                    text: text.trim(),
                }
            }
            None => Input::Note {
                mood: None,
                text: rest,
            },
        },
        "notes" => Input::Notes,
        "forget" => rest
            .parse()
            .map(Input::Forget)
            .unwrap_or_else(|_| Input::Invalid(format!("Not a note id: `{rest}`"))),
        "export" if !rest.is_empty() => Input::Export(rest),
        "export" => Input::Invalid("Usage: /export <path>".to_string()),
        "help" => Input::Help,
        "quit" | "exit" => Input::Quit,
        _ => Input::Invalid(format!("Unknown command `/{name}`, try /help")),
    }
}

/// Voices every assistant reply into numbered files under `dir`.
pub struct Speaker {
    client: ElevenLabsClient,
    cache: Option<SpeechCache>,
    voice_id: String,
    dir: PathBuf,
    spoken: usize,
}

impl Speaker {
    pub async fn new(
        client: ElevenLabsClient,
        cache: Option<SpeechCache>,
        voice_id: String,
        dir: PathBuf,
    ) -> Result<Self> {
        tokio::fs::create_dir_all(&dir)
            .await
            .with_context(|| format!("Failed to create {}", dir.display()))?;
        Ok(Self {
            client,
            cache,
            voice_id,
            dir,
            spoken: 0,
        })
    }

    async fn say(&mut self, text: &str) -> Result<PathBuf> {
        self.spoken += 1;
        let file_path = self.dir.join(speech_file_name(self.spoken));
        speech::speak(
            &self.client,
            self.cache.as_ref(),
            &self.voice_id,
            text,
            &file_path,
        )
        .await?;
        Ok(file_path)
    }
}

/// Zero-padded so the files of a session sort in reply order.
fn speech_file_name(index: usize) -> String {
    format!("{index:03}.mp3")
}

fn print_banner(persona: Persona) {
    let profile = persona.profile();
    println!("{} {} - {}", profile.icon, profile.name, profile.description);
}

pub async fn run<R: Rng>(session: &mut ChatSession<R>, mut speaker: Option<Speaker>) -> Result<()> {
    if session.is_offline() {
        println!("(offline: replies are canned)");
    }
    print_banner(session.persona());
    println!("Type /help for commands.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        print!("{}> ", session.persona());
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await.context("Failed to read from stdin")? else {
            break;
        };

        match parse(&line) {
            Input::Empty => {}
            Input::Quit => break,
            Input::Help => println!("{HELP}"),
            Input::Invalid(message) => println!("{message}"),
            Input::Mode(persona) => {
                session.set_mode(persona);
                print_banner(persona);
            }
            Input::History => {
                for message in session.messages() {
                    let speaker = match (message.is_user, message.mode) {
                        (true, _) => "you".to_string(),
                        (false, Some(persona)) => persona.to_string(),
                        (false, None) => Persona::Neutral.to_string(),
                    };
                    println!(
                        "#{} {} {speaker}: {}",
                        message.id,
                        message.timestamp.format("%H:%M:%S"),
                        message.content
                    );
                }
            }
            Input::Clear => {
                let count = session.messages().len();
                session.clear();
                println!("Forgot {count} messages.");
            }
            Input::Note { mood, text } => match session.add_note(text, mood) {
                Some(id) => println!("Saved note #{id}."),
                None => println!("Nothing to save."),
            },
            Input::Notes => {
                if session.notes().is_empty() {
                    println!("No notes yet.");
                }
                for note in session.notes() {
                    let mood = note
                        .mood
                        .as_ref()
                        .map(|mood| format!(" [{mood}]"))
                        .unwrap_or_default();
                    println!(
                        "#{} {}{mood}\n    {}",
                        note.id,
                        note.timestamp.format("%Y-%m-%d %H:%M"),
                        note.content
                    );
                }
            }
            Input::Forget(id) => {
                if session.remove_note(id) {
                    println!("Deleted note #{id}.");
                } else {
                    println!("No note #{id}.");
                }
            }
            Input::Export(path) => match tokio::fs::write(path, session.export_notes()).await {
                Ok(()) => println!("Exported {} notes to {path}.", session.notes().len()),
                Err(err) => println!("Failed to export notes: {err}"),
            },
            Input::Say(text) => {
                let reply = session.send(text).await.clone();
                if let Some(error) = session.error() {
                    eprintln!("{error}");
                }

                let icon = reply.mode.unwrap_or(Persona::Neutral).profile().icon;
                println!("{icon} {}", reply.content);
                if let Some(audio_url) = &reply.audio_url {
                    println!("   audio: {audio_url}");
                }

                if let Some(speaker) = speaker.as_mut() {
                    match speaker.say(&reply.content).await {
                        Ok(file_path) => println!("   saved {}", file_path.display()),
                        Err(err) => warn!("Failed to synthesize reply: {err:#}"),
                    }
                }
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_is_said() {
        assert_eq!(parse("  I had a long day  "), Input::Say("I had a long day"));
        assert_eq!(parse("   "), Input::Empty);
    }

    #[test]
    fn mode_switch() {
        assert_eq!(parse("/mode narrator"), Input::Mode(Persona::Narrator));
        assert_eq!(parse("/mode Career"), Input::Mode(Persona::Career));
        assert!(matches!(parse("/mode pirate"), Input::Invalid(_)));
        assert!(matches!(parse("/mode"), Input::Invalid(_)));
    }

    #[test]
    fn notes_with_and_without_mood() {
        assert_eq!(
            parse("/note mood:Calm went for a walk"),
            Input::Note {
                mood: Some("Calm"),
                text: "went for a walk"
            }
        );
        assert_eq!(
            parse("/note went for a walk"),
            Input::Note {
                mood: None,
                text: "went for a walk"
            }
        );
    }

    #[test]
    fn other_commands() {
        assert_eq!(parse("/forget 4"), Input::Forget(4));
        assert!(matches!(parse("/forget four"), Input::Invalid(_)));
        assert_eq!(parse("/export notes.txt"), Input::Export("notes.txt"));
        assert!(matches!(parse("/export"), Input::Invalid(_)));
        assert_eq!(parse("/quit"), Input::Quit);
        assert_eq!(parse("/clear"), Input::Clear);
        assert_eq!(parse("/history"), Input::History);
        assert!(matches!(parse("/dance"), Input::Invalid(_)));
    }

    #[test]
    fn speech_files_sort_in_reply_order() {
        assert_eq!(speech_file_name(1), "001.mp3");
        assert_eq!(speech_file_name(42), "042.mp3");
        assert!(speech_file_name(9) < speech_file_name(10));
    }
}
