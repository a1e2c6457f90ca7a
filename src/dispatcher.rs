//! Canned replies keyed by persona and intent.
//!
//! Short messages and greetings always land in the persona's greeting pool.
//! Anything else walks the persona's ordered intent routes (first marker hit
//! wins) before settling on the persona's default pool.

use anyhow::{Context, Result, bail};
use itertools::Itertools;
use rand::Rng;
use std::collections::HashMap;
use std::iter;
use tracing::{debug, error};

use crate::persona::{IntentBucket, Persona};

const GREETING_MARKERS: &[&str] = &["hello", "hi", "hey"];

/// Messages shorter than this many characters are treated as greetings.
const SHORT_MESSAGE_CHARS: usize = 20;

struct Route {
    markers: &'static [&'static str],
    bucket: IntentBucket,
}

struct Routes {
    intents: &'static [Route],
    default: IntentBucket,
}

impl Routes {
    fn buckets(&self) -> impl Iterator<Item = IntentBucket> + '_ {
        iter::once(IntentBucket::Greeting)
            .chain(self.intents.iter().map(|route| route.bucket))
            .chain(iter::once(self.default))
            .unique()
    }
}

static THERAPIST_ROUTES: Routes = Routes {
    intents: &[
        Route {
            markers: &["feel", "emotion", "sad", "stressed", "anxious", "overwhelmed"],
            bucket: IntentBucket::Supportive,
        },
        Route {
            markers: &["better", "improve", "help", "change"],
            bucket: IntentBucket::Empowering,
        },
    ],
    default: IntentBucket::Reflective,
};

static CAREER_ROUTES: Routes = Routes {
    intents: &[
        Route {
            markers: &["want to", "goal", "become", "achieve"],
            bucket: IntentBucket::Motivational,
        },
        Route {
            markers: &["network", "connect", "people", "relationship"],
            bucket: IntentBucket::Networking,
        },
        Route {
            markers: &["how", "strategy", "plan", "step"],
            bucket: IntentBucket::Strategic,
        },
    ],
    default: IntentBucket::Motivational,
};

static NARRATOR_ROUTES: Routes = Routes {
    intents: &[
        Route {
            markers: &["story", "tell", "narrative", "write"],
            bucket: IntentBucket::Creative,
        },
        Route {
            markers: &["feel", "emotion", "experience", "moment"],
            bucket: IntentBucket::Emotional,
        },
        Route {
            markers: &["what if", "continue", "happen", "next"],
            bucket: IntentBucket::Collaborative,
        },
    ],
    default: IntentBucket::Creative,
};

fn routes(persona: Persona) -> Option<&'static Routes> {
    match persona {
        Persona::Therapist => Some(&THERAPIST_ROUTES),
        Persona::Career => Some(&CAREER_ROUTES),
        Persona::Narrator => Some(&NARRATOR_ROUTES),
        Persona::Neutral => None,
    }
}

/// Buckets the dispatcher may select for `persona`; empty for neutral.
pub fn required_buckets(persona: Persona) -> Vec<IntentBucket> {
    routes(persona)
        .map(|routes| routes.buckets().collect())
        .unwrap_or_default()
}

/// Picks the bucket a message is answered from, or `None` in neutral mode.
pub fn intent_bucket(message: &str, persona: Persona) -> Option<IntentBucket> {
    let routes = routes(persona)?;
    let lower = message.to_lowercase();

    if GREETING_MARKERS.iter().any(|marker| lower.contains(*marker))
        || message.chars().count() < SHORT_MESSAGE_CHARS
    {
        return Some(IntentBucket::Greeting);
    }

    let bucket = routes
        .intents
        .iter()
        .find(|route| route.markers.iter().any(|marker| lower.contains(*marker)))
        .map_or(routes.default, |route| route.bucket);
    Some(bucket)
}

/// Non-empty list of candidate replies.
#[derive(Debug, Clone)]
pub struct ReplyPool(Vec<String>);

impl ReplyPool {
    pub fn new(replies: Vec<String>) -> Result<Self> {
        if replies.is_empty() {
            bail!("Reply pool is empty");
        }
        if replies.iter().any(|reply| reply.trim().is_empty()) {
            bail!("Reply pool contains a blank reply");
        }
        Ok(Self(replies))
    }

    pub fn pick<R: Rng>(&self, rng: &mut R) -> &str {
        &self.0[rng.random_range(0..self.0.len())]
    }

    #[cfg(test)]
    pub fn contains(&self, reply: &str) -> bool {
        self.0.iter().any(|candidate| candidate == reply)
    }
}

#[derive(Debug, Clone)]
pub struct ResponsePools {
    pools: HashMap<(Persona, IntentBucket), ReplyPool>,
}

impl ResponsePools {
    /// Checks that every bucket the dispatcher can select is present and
    /// non-empty, and that no bucket is configured which it never selects.
    pub fn new(mut tables: HashMap<Persona, HashMap<IntentBucket, Vec<String>>>) -> Result<Self> {
        if tables.contains_key(&Persona::Neutral) {
            bail!("The neutral persona has no reply pools");
        }

        let mut pools = HashMap::new();
        for persona in Persona::SPECIALISTS {
            let mut buckets = tables.remove(&persona).unwrap_or_default();
            for bucket in required_buckets(persona) {
                let replies = buckets
                    .remove(&bucket)
                    .with_context(|| format!("Missing reply pool '{persona}.{bucket}'"))?;
                let pool = ReplyPool::new(replies)
                    .with_context(|| format!("Invalid reply pool '{persona}.{bucket}'"))?;
                pools.insert((persona, bucket), pool);
            }
            if let Some(bucket) = buckets.keys().next() {
                bail!("Reply pool '{persona}.{bucket}' is never used by persona '{persona}'");
            }
        }

        Ok(Self { pools })
    }

    pub fn get(&self, persona: Persona, bucket: IntentBucket) -> Option<&ReplyPool> {
        self.pools.get(&(persona, bucket))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchResult {
    pub content: String,
    pub mode: Persona,
}

#[derive(Debug, Clone)]
pub struct ResponseDispatcher {
    pools: ResponsePools,
    neutral_reply: String,
}

impl ResponseDispatcher {
    pub fn new(pools: ResponsePools, neutral_reply: String) -> Result<Self> {
        if neutral_reply.trim().is_empty() {
            bail!("The neutral reply is empty");
        }
        Ok(Self {
            pools,
            neutral_reply,
        })
    }

    #[cfg(test)]
    pub fn pools(&self) -> &ResponsePools {
        &self.pools
    }

    #[cfg(test)]
    pub fn neutral_reply(&self) -> &str {
        &self.neutral_reply
    }

    pub fn respond<R: Rng>(
        &self,
        message: &str,
        persona: Persona,
        rng: &mut R,
    ) -> DispatchResult {
        let Some(bucket) = intent_bucket(message, persona) else {
            return self.neutral();
        };

        match self.pools.get(persona, bucket) {
            Some(pool) => {
                debug!(%persona, %bucket, "Dispatching canned reply");
                DispatchResult {
                    content: pool.pick(rng).to_owned(),
                    mode: persona,
                }
            }
            None => {
                error!(%persona, %bucket, "No reply pool loaded");
                self.neutral()
            }
        }
    }

    fn neutral(&self) -> DispatchResult {
        DispatchResult {
            content: self.neutral_reply.clone(),
            mode: Persona::Neutral,
        }
    }
}
