mod cache;
mod classifier;
mod config;
mod dispatcher;
mod elevenlabs;
mod persona;
mod repl;
mod session;
mod speech;

use anyhow::Context;
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;
use structopt::StructOpt;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::cache::SpeechCache;
use crate::config::Config;
use crate::elevenlabs::ElevenLabsClient;
use crate::persona::Persona;
use crate::session::{Backend, ChatSession};

#[derive(Deserialize, Debug)]
struct Environment {
    elevenlabs_api_key: Option<String>,
    elevenlabs_agent_id: Option<String>,
    elevenlabs_api_url: Option<String>,
    #[serde(default = "default_voice_id")]
    elevenlabs_voice_id: String,
}

fn default_voice_id() -> String {
    elevenlabs::DEFAULT_VOICE_ID.to_string()
}

impl Environment {
    fn client(&self) -> anyhow::Result<Option<ElevenLabsClient>> {
        let Some(api_key) = &self.elevenlabs_api_key else {
            return Ok(None);
        };

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("Failed to build HTTP client")?;

        let mut client = ElevenLabsClient::new(api_key).with_http_client(http);
        if let Some(agent_id) = &self.elevenlabs_agent_id {
            client = client.with_agent_id(agent_id);
        }
        if let Some(base_url) = &self.elevenlabs_api_url {
            client = client.with_base_url(base_url);
        }
        Ok(Some(client))
    }
}

#[derive(StructOpt, Debug)]
#[structopt(
    name = "persona-chat",
    about = "Talk to a therapist, a career mentor or a story narrator"
)]
struct Args {
    /// Path to a persona configuration TOML file
    #[structopt(short = "c", long, env = "PERSONA_CHAT_CONFIG")]
    config: Option<PathBuf>,

    #[structopt(subcommand)]
    command: Command,
}

#[derive(StructOpt, Debug)]
enum Command {
    /// Guess which persona a message is meant for
    Classify {
        /// Print the keyword score of every persona
        #[structopt(long)]
        scores: bool,

        #[structopt(required = true)]
        message: Vec<String>,
    },

    /// Print a canned reply without contacting ElevenLabs
    Respond {
        /// Persona answering (therapist, career, narrator or neutral)
        #[structopt(short, long, default_value = "therapist")]
        persona: Persona,

        #[structopt(required = true)]
        message: Vec<String>,
    },

    /// Start an interactive chat on stdin
    Chat {
        /// Persona to start with
        #[structopt(short, long, default_value = "therapist")]
        persona: Persona,

        /// Pick a persona from the message while in neutral mode
        #[structopt(long)]
        auto_detect: bool,

        /// Use canned replies even when an API key is configured
        #[structopt(long)]
        offline: bool,

        /// Save each reply as speech into this directory
        #[structopt(long)]
        speak_dir: Option<PathBuf>,
    },

    /// Synthesize speech for a piece of text
    Speak {
        /// Output audio file
        #[structopt(short, long)]
        output: PathBuf,

        /// ElevenLabs voice id (defaults to ELEVENLABS_VOICE_ID)
        #[structopt(long)]
        voice: Option<String>,

        #[structopt(required = true)]
        text: Vec<String>,
    },
}

async fn speech_cache() -> Option<SpeechCache> {
    SpeechCache::new()
        .await
        .inspect_err(|err| warn!("Speech cache unavailable: {err:#}"))
        .ok()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let environment = envy::from_env::<Environment>()?;
    let args = Args::from_args();

    let config = Config::load(args.config.as_deref())
        .await
        .context("Failed to load persona configuration")?;

    match args.command {
        Command::Classify { scores, message } => {
            let message = message.join(" ");
            if scores {
                for (persona, score) in config.classifier.scores(&message) {
                    println!("{persona}: {score}");
                }
            }
            println!("{}", config.classifier.classify(&message));
        }
        Command::Respond { persona, message } => {
            let reply = config
                .dispatcher
                .respond(&message.join(" "), persona, &mut rand::rng());
            println!("{} {}", reply.mode.profile().icon, reply.content);
        }
        Command::Chat {
            persona,
            auto_detect,
            offline,
            speak_dir,
        } => {
            let client = environment.client()?;

            let speaker = match (speak_dir, &client) {
                (Some(dir), Some(client)) => Some(
                    repl::Speaker::new(
                        client.clone(),
                        speech_cache().await,
                        environment.elevenlabs_voice_id.clone(),
                        dir,
                    )
                    .await?,
                ),
                (Some(_), None) => {
                    warn!("ELEVENLABS_API_KEY not set, replies will not be spoken");
                    None
                }
                (None, _) => None,
            };

            let backend = match client {
                Some(client) if !offline => Backend::Remote(client),
                _ => {
                    info!("Replying with canned responses");
                    Backend::Offline
                }
            };

            let mut session = ChatSession::new(config, backend, StdRng::from_os_rng())
                .with_persona(persona)
                .with_auto_detect(auto_detect);

            repl::run(&mut session, speaker).await?;
        }
        Command::Speak {
            output,
            voice,
            text,
        } => {
            let client = environment
                .client()?
                .context("ELEVENLABS_API_KEY environment variable not set")?;
            let voice_id = voice.unwrap_or(environment.elevenlabs_voice_id);

            println!("Generating audio…");
            speech::speak(
                &client,
                speech_cache().await.as_ref(),
                &voice_id,
                &text.join(" "),
                &output,
            )
            .await?;
            println!("Saved {}.", output.display());
        }
    }

    Ok(())
}
