//! Per-session shortlist state.
//!
//! The shortlist accumulates across batches within a session. It lives in a
//! `SessionStore` keyed by session id and is merged under an explicit
//! `ShortlistPolicy`, so whether repeated uploads produce duplicates is a
//! configuration choice.

use std::collections::HashMap;
use std::str::FromStr;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Script};
use thiserror::Error;
use tokio::sync::RwLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ShortlistPolicy {
    /// Keep the first occurrence of each filename.
    #[default]
    Dedupe,
    /// Append every newly shortlisted filename, duplicates included.
    AppendOnly,
}

#[derive(Debug, Error)]
#[error("unknown shortlist policy '{0}' (expected 'dedupe' or 'append')")]
pub struct ParsePolicyError(String);

impl FromStr for ShortlistPolicy {
    type Err = ParsePolicyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "dedupe" => Ok(ShortlistPolicy::Dedupe),
            "append" | "append-only" | "append_only" => Ok(ShortlistPolicy::AppendOnly),
            other => Err(ParsePolicyError(other.to_string())),
        }
    }
}

/// Existing entries first, then `new` in order, filtered by `policy`.
pub fn merge_shortlist(existing: Vec<String>, new: &[String], policy: ShortlistPolicy) -> Vec<String> {
    let mut merged = existing;
    match policy {
        ShortlistPolicy::AppendOnly => merged.extend(new.iter().cloned()),
        ShortlistPolicy::Dedupe => {
            let mut deduped: Vec<String> = Vec::with_capacity(merged.len() + new.len());
            for name in merged.into_iter().chain(new.iter().cloned()) {
                if !deduped.contains(&name) {
                    deduped.push(name);
                }
            }
            merged = deduped;
        }
    }
    merged
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("corrupt session payload: {0}")]
    Payload(#[from] serde_json::Error),
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Shortlist for `session_id`; empty when the session is unknown.
    async fn load(&self, session_id: &str) -> Result<Vec<String>, SessionError>;

    /// Merges `new` into the stored shortlist as a single step and returns
    /// the result. Concurrent appends to one session never lose entries.
    async fn append(
        &self,
        session_id: &str,
        new: &[String],
        policy: ShortlistPolicy,
    ) -> Result<Vec<String>, SessionError>;
}

impl ShortlistPolicy {
    fn as_str(self) -> &'static str {
        match self {
            ShortlistPolicy::Dedupe => "dedupe",
            ShortlistPolicy::AppendOnly => "append",
        }
    }
}

/// Read, merge and write back inside Redis so two batches for the same
/// session cannot interleave. cjson encodes an empty table as `{}`, hence
/// the explicit `[]`.
const APPEND_SCRIPT: &str = r#"
local raw = redis.call('GET', KEYS[1])
local existing = {}
if raw then existing = cjson.decode(raw) end
local incoming = cjson.decode(ARGV[2])

local merged, seen = {}, {}
local function add(name)
  if ARGV[1] ~= 'dedupe' or not seen[name] then
    seen[name] = true
    merged[#merged + 1] = name
  end
end
for _, name in ipairs(existing) do add(name) end
for _, name in ipairs(incoming) do add(name) end

local out = '[]'
if #merged > 0 then out = cjson.encode(merged) end
redis.call('SET', KEYS[1], out, 'EX', ARGV[3])
return out
"#;

pub struct RedisSessionStore {
    conn: ConnectionManager,
    append_script: Script,
    ttl_secs: u64,
}

impl RedisSessionStore {
    /// Opens one managed connection that all requests share; it reconnects
    /// on its own after a dropped link.
    pub async fn connect(client: redis::Client, ttl_secs: u64) -> Result<Self, SessionError> {
        let conn = client.get_connection_manager().await?;
        Ok(Self {
            conn,
            append_script: Script::new(APPEND_SCRIPT),
            ttl_secs,
        })
    }

    fn key(session_id: &str) -> String {
        format!("screener:session:{session_id}:shortlist")
    }
}

#[async_trait]
impl SessionStore for RedisSessionStore {
    async fn load(&self, session_id: &str) -> Result<Vec<String>, SessionError> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = conn.get(Self::key(session_id)).await?;
        match raw {
            Some(json) => Ok(serde_json::from_str(&json)?),
            None => Ok(Vec::new()),
        }
    }

    async fn append(
        &self,
        session_id: &str,
        new: &[String],
        policy: ShortlistPolicy,
    ) -> Result<Vec<String>, SessionError> {
        let mut conn = self.conn.clone();
        let json: String = self
            .append_script
            .key(Self::key(session_id))
            .arg(policy.as_str())
            .arg(serde_json::to_string(new)?)
            .arg(self.ttl_secs)
            .invoke_async(&mut conn)
            .await?;
        Ok(serde_json::from_str(&json)?)
    }
}

/// Process-local store, used when no Redis URL is configured.
#[derive(Default)]
pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<String, Vec<String>>>,
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn load(&self, session_id: &str) -> Result<Vec<String>, SessionError> {
        Ok(self
            .sessions
            .read()
            .await
            .get(session_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn append(
        &self,
        session_id: &str,
        new: &[String],
        policy: ShortlistPolicy,
    ) -> Result<Vec<String>, SessionError> {
        let mut sessions = self.sessions.write().await;
        let existing = sessions.remove(session_id).unwrap_or_default();
        let merged = merge_shortlist(existing, new, policy);
        sessions.insert(session_id.to_string(), merged.clone());
        Ok(merged)
    }
}
