//! Persona tables loaded from TOML.
//!
//! A default document is compiled into the binary; a user file replaces it
//! wholesale. Every table is validated here so that nothing downstream can
//! hit an empty pool at reply time.

use anyhow::{Context, Result, anyhow, bail};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, info};

use crate::classifier::{KeywordSets, ModeClassifier};
use crate::dispatcher::{ResponseDispatcher, ResponsePools};
use crate::persona::{IntentBucket, Persona};
use crate::session::FallbackPools;

const BUILTIN_CONFIG: &str = include_str!("../config/personas.toml");

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    neutral_reply: String,
    keywords: HashMap<String, Vec<String>>,
    responses: HashMap<String, HashMap<String, Vec<String>>>,
    fallbacks: HashMap<String, Vec<String>>,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub classifier: ModeClassifier,
    pub dispatcher: ResponseDispatcher,
    pub fallbacks: FallbackPools,
}

impl Config {
    /// Loads `path` if given, else the per-user file if it exists, else the
    /// built-in tables.
    pub async fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(path) => Some(path.to_owned()),
            None => user_config_path().filter(|path| path.exists()),
        };

        match path {
            Some(path) => {
                info!("Loading persona configuration from {}", path.display());
                let text = tokio::fs::read_to_string(&path)
                    .await
                    .with_context(|| format!("Failed to read {}", path.display()))?;
                Self::from_toml(&text)
                    .with_context(|| format!("Invalid persona configuration in {}", path.display()))
            }
            None => {
                debug!("Using built-in persona configuration");
                Self::builtin()
            }
        }
    }

    pub fn builtin() -> Result<Self> {
        Self::from_toml(BUILTIN_CONFIG).context("Built-in persona configuration is invalid")
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        let raw: RawConfig = toml::from_str(text).context("Failed to parse persona TOML")?;

        let keywords = by_persona(raw.keywords, "keywords")?;

        let responses = by_persona(raw.responses, "responses")?
            .into_iter()
            .map(|(persona, buckets)| {
                let buckets = buckets
                    .into_iter()
                    .map(|(bucket, replies)| Ok((parse_bucket(&bucket)?, replies)))
                    .collect::<Result<HashMap<_, _>>>()?;
                Ok((persona, buckets))
            })
            .collect::<Result<HashMap<_, _>>>()?;

        let fallbacks = by_persona(raw.fallbacks, "fallbacks")?;

        let classifier = ModeClassifier::new(KeywordSets::new(keywords)?);
        let dispatcher = ResponseDispatcher::new(ResponsePools::new(responses)?, raw.neutral_reply)?;
        let fallbacks = FallbackPools::new(fallbacks)?;

        Ok(Self {
            classifier,
            dispatcher,
            fallbacks,
        })
    }
}

pub fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(env!("CARGO_PKG_NAME")).join("personas.toml"))
}

fn parse_persona(name: &str) -> Result<Persona> {
    Persona::from_str(name).map_err(|_| anyhow!("Unknown persona '{name}'"))
}

/// Keys a table by persona. Persona names are case-insensitive, so two
/// spellings of one persona are rejected rather than one silently winning.
fn by_persona<T>(entries: HashMap<String, T>, table: &str) -> Result<HashMap<Persona, T>> {
    let mut parsed = HashMap::new();
    for (name, value) in entries {
        let persona = parse_persona(&name)?;
        if parsed.insert(persona, value).is_some() {
            bail!("Persona '{persona}' appears more than once in [{table}]");
        }
    }
    Ok(parsed)
}

fn parse_bucket(name: &str) -> Result<IntentBucket> {
    IntentBucket::from_str(name).map_err(|_| anyhow!("Unknown intent bucket '{name}'"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const MINIMAL: &str = r#"
neutral_reply = "Pick a persona."

[keywords]
therapist = ["sad"]
career = ["job"]
narrator = ["story"]

[responses.therapist]
greeting = ["t-greeting"]
supportive = ["t-supportive"]
reflective = ["t-reflective"]
empowering = ["t-empowering"]

[responses.career]
greeting = ["c-greeting"]
motivational = ["c-motivational"]
strategic = ["c-strategic"]
networking = ["c-networking"]

[responses.narrator]
greeting = ["n-greeting"]
creative = ["n-creative"]
emotional = ["n-emotional"]
collaborative = ["n-collaborative"]

[fallbacks]
therapist = ["t-fallback"]
career = ["c-fallback"]
narrator = ["n-fallback"]
neutral = ["fallback"]
"#;

    fn error_of(text: &str) -> String {
        format!("{:#}", Config::from_toml(text).unwrap_err())
    }

    fn edited(from: &str, to: &str) -> String {
        assert!(MINIMAL.contains(from), "{from:?} is not in the test config");
        MINIMAL.replacen(from, to, 1)
    }

    #[test]
    fn builtin_loads() {
        let config = Config::builtin().unwrap();
        assert_eq!(config.classifier.classify("resume and salary"), Persona::Career);
    }

    #[test]
    fn minimal_loads() {
        let config = Config::from_toml(MINIMAL).unwrap();
        assert_eq!(config.dispatcher.neutral_reply(), "Pick a persona.");
    }

    #[test]
    fn empty_bucket_fails_at_load() {
        let error = error_of(&edited(r#"networking = ["c-networking"]"#, "networking = []"));
        assert!(error.contains("Invalid reply pool 'career.networking'"), "{error}");
        assert!(error.contains("Reply pool is empty"), "{error}");
    }

    #[test]
    fn missing_bucket_fails_at_load() {
        let error = error_of(&edited("emotional = [\"n-emotional\"]\n", ""));
        assert!(error.contains("Missing reply pool 'narrator.emotional'"), "{error}");
    }

    #[test]
    fn unused_bucket_fails_at_load() {
        let error = error_of(&edited(
            r#"networking = ["c-networking"]"#,
            "networking = [\"c-networking\"]\nsupportive = [\"x\"]",
        ));
        assert!(error.contains("'career.supportive' is never used"), "{error}");
    }

    #[test]
    fn unknown_names_fail_at_load() {
        let error = error_of(&edited("[responses.narrator]", "[responses.wizard]"));
        assert!(error.contains("Unknown persona 'wizard'"), "{error}");

        let error = error_of(&edited(r#"greeting = ["n-greeting"]"#, r#"hello = ["n-greeting"]"#));
        assert!(error.contains("Unknown intent bucket 'hello'"), "{error}");

        assert!(Config::from_toml(&format!("extra = 1\n{MINIMAL}")).is_err());
    }

    #[test]
    fn keyword_sets_are_checked() {
        let error = error_of(&edited("narrator = [\"story\"]\n", ""));
        assert!(error.contains("No keywords configured for persona 'narrator'"), "{error}");

        let error = error_of(&edited("[keywords]\n", "[keywords]\nneutral = [\"x\"]\n"));
        assert!(error.contains("neutral persona cannot have keywords"), "{error}");
    }

    #[test]
    fn persona_spelled_twice_fails_at_load() {
        let error = error_of(&edited("[keywords]\n", "[keywords]\nTherapist = [\"calm\"]\n"));
        assert!(error.contains("Persona 'therapist' appears more than once in [keywords]"), "{error}");

        let error = error_of(&edited("[fallbacks]\n", "[fallbacks]\nCAREER = [\"busy\"]\n"));
        assert!(error.contains("appears more than once in [fallbacks]"), "{error}");
    }

    #[test]
    fn persona_names_ignore_case() {
        let config = Config::from_toml(&edited("[keywords]\ntherapist", "[keywords]\nTherapist")).unwrap();
        assert_eq!(config.classifier.classify("so sad"), Persona::Therapist);
    }

    #[test]
    fn keywords_are_lowercased() {
        let config = Config::from_toml(&edited(r#"therapist = ["sad"]"#, r#"therapist = ["SAD"]"#)).unwrap();
        assert_eq!(config.classifier.classify("so sad"), Persona::Therapist);
    }

    #[test]
    fn missing_fallback_fails_at_load() {
        let error = error_of(&edited("neutral = [\"fallback\"]\n", ""));
        assert!(error.contains("Missing fallback replies for persona 'neutral'"), "{error}");
    }

    #[test]
    fn empty_neutral_reply_fails_at_load() {
        let error = error_of(&edited("\"Pick a persona.\"", "\"\""));
        assert!(error.contains("neutral reply is empty"), "{error}");
    }

    #[tokio::test]
    async fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(MINIMAL.as_bytes()).unwrap();

        let config = Config::load(Some(file.path())).await.unwrap();
        assert_eq!(config.classifier.classify("a story"), Persona::Narrator);
    }

    #[tokio::test]
    async fn unreadable_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("personas.toml");
        assert!(Config::load(Some(&missing)).await.is_err());
    }
}
