use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use itertools::Itertools;
use rand::Rng;
use std::collections::HashMap;
use strum::IntoEnumIterator;
use tracing::{error, info, warn};

use crate::classifier::ModeClassifier;
use crate::config::Config;
use crate::dispatcher::{ReplyPool, ResponseDispatcher};
use crate::elevenlabs::{self, AgentReply, ElevenLabsClient, HistoryEntry, Role};
use crate::persona::Persona;

const THERAPIST_TROUBLE: &str = "I'm here for you, even though I'm experiencing some technical difficulties. Your feelings are valid and important. Please try again in a moment.";
const GENERAL_TROUBLE: &str = "I'm experiencing some technical issues, but I'm committed to helping you achieve your career goals. Please try again shortly.";

/// Replies used when the voice service cannot be reached, one pool per persona.
#[derive(Debug, Clone)]
pub struct FallbackPools(HashMap<Persona, ReplyPool>);

impl FallbackPools {
    pub fn new(mut tables: HashMap<Persona, Vec<String>>) -> Result<Self> {
        let pools = Persona::iter()
            .map(|persona| {
                let replies = tables
                    .remove(&persona)
                    .with_context(|| format!("Missing fallback replies for persona '{persona}'"))?;
                let pool = ReplyPool::new(replies)
                    .with_context(|| format!("Invalid fallback replies for persona '{persona}'"))?;
                Ok((persona, pool))
            })
            .collect::<Result<HashMap<_, _>>>()?;
        Ok(Self(pools))
    }

    pub fn get(&self, persona: Persona) -> Option<&ReplyPool> {
        self.0.get(&persona)
    }

    /// Random fallback reply for `persona`.
    pub fn reply<R: Rng>(&self, persona: Persona, rng: &mut R) -> String {
        match self.get(persona) {
            Some(pool) => pool.pick(rng).to_owned(),
            None => {
                error!(%persona, "No fallback replies loaded");
                trouble_message(persona).to_owned()
            }
        }
    }
}

/// Where assistant replies come from.
pub enum Backend {
    Remote(ElevenLabsClient),
    /// Canned replies only, used when no API key is configured.
    Offline,
}

#[derive(Debug, Clone)]
pub struct Message {
    pub id: u64,
    pub content: String,
    pub timestamp: DateTime<Local>,
    pub is_user: bool,
    /// Persona that produced an assistant message; unset for user messages
    /// and for replies given in neutral mode.
    pub mode: Option<Persona>,
    pub audio_url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct SessionNote {
    pub id: u64,
    pub content: String,
    pub timestamp: DateTime<Local>,
    pub mood: Option<String>,
}

pub struct ChatSession<R> {
    backend: Backend,
    classifier: ModeClassifier,
    dispatcher: ResponseDispatcher,
    fallbacks: FallbackPools,
    rng: R,
    auto_detect: bool,
    persona: Persona,
    messages: Vec<Message>,
    notes: Vec<SessionNote>,
    error: Option<String>,
    next_id: u64,
}

impl<R: Rng> ChatSession<R> {
    pub fn new(config: Config, backend: Backend, rng: R) -> Self {
        Self {
            backend,
            classifier: config.classifier,
            dispatcher: config.dispatcher,
            fallbacks: config.fallbacks,
            rng,
            auto_detect: false,
            persona: Persona::Therapist,
            messages: Vec::new(),
            notes: Vec::new(),
            error: None,
            next_id: 1,
        }
    }

    /// Lets a neutral session pick up a persona from the first message that
    /// clearly belongs to one.
    pub fn with_auto_detect(mut self, enabled: bool) -> Self {
        self.auto_detect = enabled;
        self
    }

    pub fn with_persona(mut self, persona: Persona) -> Self {
        self.persona = persona;
        self
    }

    pub fn persona(&self) -> Persona {
        self.persona
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn notes(&self) -> &[SessionNote] {
        &self.notes
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn is_offline(&self) -> bool {
        matches!(self.backend, Backend::Offline)
    }

    /// Switches persona without dropping the conversation.
    pub fn set_mode(&mut self, persona: Persona) {
        info!(from = %self.persona, to = %persona, "Switching persona");
        self.persona = persona;
        self.error = None;
    }

    pub fn clear(&mut self) {
        self.messages.clear();
        self.error = None;
    }

    /// Records the user's message and the assistant's reply, returning the
    /// reply. Service rejections are kept in [`Self::error`] and answered
    /// with an apology rather than propagated.
    pub async fn send(&mut self, content: &str) -> &Message {
        let history = self.history();
        self.push(content.to_owned(), true, None, None);
        self.error = None;

        if self.auto_detect && self.persona == Persona::Neutral {
            let detected = self.classifier.classify(content);
            if detected != Persona::Neutral {
                info!(%detected, "Detected persona from message");
                self.persona = detected;
            }
        }
        let persona = self.persona;

        let (text, audio_url) = match &self.backend {
            Backend::Offline => {
                let reply = self.dispatcher.respond(content, persona, &mut self.rng);
                (reply.content, None)
            }
            Backend::Remote(client) => match client.converse(content, persona, &history).await {
                Ok(AgentReply {
                    text: Some(text),
                    audio_url,
                }) => (text, audio_url),
                Ok(AgentReply {
                    text: None,
                    audio_url,
                }) => {
                    warn!("ElevenLabs answered without text, using a fallback reply");
                    let text = self.fallbacks.reply(persona, &mut self.rng);
                    (text, audio_url)
                }
                Err(err) if elevenlabs::is_transport_error(&err) => {
                    warn!("ElevenLabs unreachable, using a fallback reply: {err:#}");
                    let text = self.fallbacks.reply(persona, &mut self.rng);
                    (text, None)
                }
                Err(err) => {
                    error!("Error generating reply: {err:#}");
                    self.error = Some(err.to_string());
                    (trouble_message(persona).to_owned(), None)
                }
            },
        };

        let mode = (persona != Persona::Neutral).then_some(persona);
        self.push(text, false, mode, audio_url)
    }

    /// Saves a note; blank notes are ignored.
    pub fn add_note(&mut self, content: &str, mood: Option<&str>) -> Option<u64> {
        let content = content.trim();
        if content.is_empty() {
            return None;
        }

        let id = self.take_id();
        self.notes.insert(
            0,
            SessionNote {
                id,
                content: content.to_owned(),
                timestamp: Local::now(),
                mood: mood
                    .map(str::trim)
                    .filter(|mood| !mood.is_empty())
                    .map(str::to_owned),
            },
        );
        Some(id)
    }

    pub fn remove_note(&mut self, id: u64) -> bool {
        let before = self.notes.len();
        self.notes.retain(|note| note.id != id);
        self.notes.len() != before
    }

    /// Plain-text export of the notes, newest first.
    pub fn export_notes(&self) -> String {
        self.notes
            .iter()
            .map(|note| {
                let mood = note
                    .mood
                    .as_ref()
                    .map(|mood| format!(" [{mood}]"))
                    .unwrap_or_default();
                format!(
                    "{}{mood}\n{}\n\n",
                    note.timestamp.format("%Y-%m-%d %H:%M:%S"),
                    note.content
                )
            })
            .join("")
    }

    fn history(&self) -> Vec<HistoryEntry> {
        self.messages
            .iter()
            .map(|message| HistoryEntry {
                role: if message.is_user {
                    Role::User
                } else {
                    Role::Assistant
                },
                content: message.content.clone(),
            })
            .collect()
    }

    fn push(
        &mut self,
        content: String,
        is_user: bool,
        mode: Option<Persona>,
        audio_url: Option<String>,
    ) -> &Message {
        let id = self.take_id();
        self.messages.push(Message {
            id,
            content,
            timestamp: Local::now(),
            is_user,
            mode,
            audio_url,
        });
        &self.messages[self.messages.len() - 1]
    }

    fn take_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }
}

fn trouble_message(persona: Persona) -> &'static str {
    match persona {
        Persona::Therapist => THERAPIST_TROUBLE,
        _ => GENERAL_TROUBLE,
    }
}
