//! Command Handler Module
//!
//! Turns a decoded RESP frame into a reply, executing it against the store.
//!
//! ## Supported Commands
//!
//! - `PING` - Test connection (also accepted as a bare `+PING` frame)
//! - `ECHO message` - Echo message
//! - `SET key value [flag milliseconds]` - Set a key, optionally with a TTL
//! - `GET key` - Get a key's value
//! - `CONFIG GET dir|dbfilename` - Read a static server parameter
//! - `SAVE` - Write the snapshot header to disk
//!
//! ## Arity
//!
//! Arity counts the verb itself, so `GET key` has arity 2. A command with
//! the wrong arity is answered with an error and never touches the store.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     CommandHandler                          │
//! │                                                             │
//! │  ┌─────────────┐    ┌─────────────┐    ┌─────────────┐     │
//! │  │  execute()  │───>│  dispatch() │───>│   cmd_*()   │     │
//! │  └─────────────┘    └─────────────┘    └─────────────┘     │
//! │                                               │             │
//! │                                               ▼             │
//! │                                   Store + Clock + Snapshot  │
//! └─────────────────────────────────────────────────────────────┘
//! ```

use crate::protocol::RespValue;
use crate::storage::{Clock, Expiry, Store, SystemClock};
use bytes::Bytes;
use std::fs::{self, File};
use std::io::Write;
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// Directory reported by `CONFIG GET dir` and used by `SAVE`.
pub const DEFAULT_DIR: &str = "/tmp/redis-data";

/// File name reported by `CONFIG GET dbfilename` and used by `SAVE`.
pub const DEFAULT_DB_FILENAME: &str = "rdbfile";

/// Header written by `SAVE`. No keys are serialized after it.
pub const SNAPSHOT_HEADER: &[u8] = b"REDIS0009";

const ERR_UNKNOWN_COMMAND: &str = "ERR unknown command";
const ERR_UNSUPPORTED_TYPE: &str = "ERR unsupported RESP type";
const ERR_INVALID_ARGUMENT: &str = "ERR invalid argument";
const ERR_INVALID_EXPIRATION: &str = "ERR invalid expiration value";
const ERR_UNSUPPORTED_CONFIG: &str = "ERR unsupported CONFIG parameter";
const ERR_SAVE_FAILED: &str = "ERR failed to save data to file";

/// Where `SAVE` writes, and what `CONFIG GET` reports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotConfig {
    pub dir: String,
    pub dbfilename: String,
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            dir: DEFAULT_DIR.to_string(),
            dbfilename: DEFAULT_DB_FILENAME.to_string(),
        }
    }
}

impl SnapshotConfig {
    pub fn path(&self) -> PathBuf {
        PathBuf::from(&self.dir).join(&self.dbfilename)
    }
}

/// Executes commands against the store it owns.
pub struct CommandHandler {
    store: Store,
    clock: Box<dyn Clock>,
    snapshot: SnapshotConfig,
}

impl std::fmt::Debug for CommandHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandHandler")
            .field("store", &self.store)
            .field("snapshot", &self.snapshot)
            .finish()
    }
}

impl Default for CommandHandler {
    fn default() -> Self {
        Self::new(Store::new())
    }
}

impl CommandHandler {
    /// Creates a handler over `store` using the system clock and the default
    /// snapshot location.
    pub fn new(store: Store) -> Self {
        Self::with_parts(store, Box::new(SystemClock), SnapshotConfig::default())
    }

    pub fn with_parts(store: Store, clock: Box<dyn Clock>, snapshot: SnapshotConfig) -> Self {
        Self {
            store,
            clock,
            snapshot,
        }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Executes a command and returns the reply.
    ///
    /// Requests normally arrive as an array of bulk strings. A bare simple
    /// string is accepted as a one-word command, which is how `+PING\r\n`
    /// gets its `+PONG`.
    pub fn execute(&mut self, frame: RespValue) -> RespValue {
        let parts = match frame {
            RespValue::Array(Some(parts)) => parts,
            RespValue::SimpleString(s) => vec![RespValue::SimpleString(s)],
            _ => return RespValue::error(ERR_UNSUPPORTED_TYPE),
        };

        if parts.is_empty() {
            return RespValue::error(ERR_UNKNOWN_COMMAND);
        }

        let mut tokens = Vec::with_capacity(parts.len());
        for part in parts {
            match token_bytes(part) {
                Some(token) => tokens.push(token),
                None => return RespValue::error(ERR_INVALID_ARGUMENT),
            }
        }

        let verb = match std::str::from_utf8(&tokens[0]) {
            Ok(s) => s.to_uppercase(),
            Err(_) => return RespValue::error(ERR_UNKNOWN_COMMAND),
        };

        self.dispatch(&verb, &tokens)
    }

    /// Dispatches a command to its handler. `tokens[0]` is the verb.
    fn dispatch(&mut self, verb: &str, tokens: &[Bytes]) -> RespValue {
        match verb {
            "PING" => RespValue::pong(),
            "ECHO" => self.cmd_echo(tokens),
            "SET" => self.cmd_set(tokens),
            "GET" => self.cmd_get(tokens),
            "CONFIG" => self.cmd_config(tokens),
            "SAVE" => self.cmd_save(tokens),
            _ => {
                debug!(command = %verb, "unknown command");
                RespValue::error(ERR_UNKNOWN_COMMAND)
            }
        }
    }

    /// ECHO message
    fn cmd_echo(&self, tokens: &[Bytes]) -> RespValue {
        if tokens.len() != 2 {
            return wrong_arity("ECHO");
        }
        RespValue::bulk_string(tokens[1].clone())
    }

    /// SET key value [flag milliseconds]
    ///
    /// The flag token is positional only; the fifth token is always read as
    /// a millisecond offset from now.
    fn cmd_set(&mut self, tokens: &[Bytes]) -> RespValue {
        let expires_at = match tokens.len() {
            3 => Expiry::Never,
            5 => {
                let offset = match parse_i64(&tokens[4]) {
                    Some(ms) => ms,
                    None => return RespValue::error(ERR_INVALID_EXPIRATION),
                };
                Expiry::after(self.clock.now_millis(), offset)
            }
            _ => return wrong_arity("SET"),
        };

        let created = self
            .store
            .put(tokens[1].clone(), tokens[2].clone(), expires_at);
        debug!(
            created = created,
            expires_at = expires_at.as_millis(),
            "key set"
        );
        RespValue::ok()
    }

    /// GET key
    fn cmd_get(&mut self, tokens: &[Bytes]) -> RespValue {
        if tokens.len() != 2 {
            return wrong_arity("GET");
        }

        match self.store.get(&tokens[1], self.clock.now_millis()) {
            Some(value) => RespValue::bulk_string(value),
            None => RespValue::null_bulk_string(),
        }
    }

    /// CONFIG GET parameter
    fn cmd_config(&self, tokens: &[Bytes]) -> RespValue {
        if tokens.len() != 3 {
            return wrong_arity("CONFIG");
        }
        if &tokens[1][..] != b"GET" {
            return RespValue::error(ERR_UNSUPPORTED_CONFIG);
        }

        let value = match &tokens[2][..] {
            b"dir" => &self.snapshot.dir,
            b"dbfilename" => &self.snapshot.dbfilename,
            _ => return RespValue::error(ERR_UNSUPPORTED_CONFIG),
        };

        RespValue::array(vec![
            RespValue::bulk_string(tokens[2].clone()),
            RespValue::bulk_string(Bytes::from(value.clone())),
        ])
    }

    /// SAVE
    fn cmd_save(&self, tokens: &[Bytes]) -> RespValue {
        if tokens.len() != 1 {
            return wrong_arity("SAVE");
        }

        let path = self.snapshot.path();
        info!(path = %path.display(), "saving snapshot");

        match self.write_snapshot() {
            Ok(()) => {
                info!(path = %path.display(), "snapshot saved");
                RespValue::ok()
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "snapshot failed");
                RespValue::error(ERR_SAVE_FAILED)
            }
        }
    }

    fn write_snapshot(&self) -> std::io::Result<()> {
        fs::create_dir_all(&self.snapshot.dir)?;
        let mut file = File::create(self.snapshot.path())?;
        file.write_all(SNAPSHOT_HEADER)?;
        file.sync_all()
    }
}

// ========================================================================
// Helper functions
// ========================================================================

/// Extracts the payload of a bulk or simple string token.
fn token_bytes(value: RespValue) -> Option<Bytes> {
    match value {
        RespValue::BulkString(Some(b)) => Some(b),
        RespValue::SimpleString(s) => Some(Bytes::from(s)),
        _ => None,
    }
}

fn parse_i64(token: &[u8]) -> Option<i64> {
    std::str::from_utf8(token).ok()?.parse().ok()
}

fn wrong_arity(verb: &str) -> RespValue {
    RespValue::error(format!(
        "ERR wrong number of arguments for '{}' command",
        verb
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::decode;
    use crate::storage::ManualClock;

    const START: i64 = 1_700_000_000_000;

    fn create_handler() -> (CommandHandler, ManualClock) {
        let clock = ManualClock::new(START);
        let handler = CommandHandler::with_parts(
            Store::new(),
            Box::new(clock.clone()),
            SnapshotConfig::default(),
        );
        (handler, clock)
    }

    fn make_command(args: &[&str]) -> RespValue {
        RespValue::array(
            args.iter()
                .map(|s| RespValue::bulk_string(Bytes::from(s.to_string())))
                .collect(),
        )
    }

    fn run(handler: &mut CommandHandler, args: &[&str]) -> Vec<u8> {
        handler.execute(make_command(args)).serialize()
    }

    #[test]
    fn test_ping() {
        let (mut handler, _) = create_handler();

        assert_eq!(run(&mut handler, &["PING"]), b"+PONG\r\n");

        let bare = decode(b"+PING\r\n").unwrap();
        assert_eq!(handler.execute(bare).serialize(), b"+PONG\r\n");
    }

    #[test]
    fn test_echo() {
        let (mut handler, _) = create_handler();

        let request = decode(b"*2\r\n$4\r\nECHO\r\n$5\r\nhello\r\n").unwrap();
        assert_eq!(handler.execute(request).serialize(), b"$5\r\nhello\r\n");

        assert_eq!(
            run(&mut handler, &["ECHO", "Hello, World!"]),
            b"$13\r\nHello, World!\r\n"
        );
    }

    #[test]
    fn test_set_get() {
        let (mut handler, _) = create_handler();

        assert_eq!(run(&mut handler, &["SET", "foo", "bar"]), b"+OK\r\n");
        assert_eq!(run(&mut handler, &["GET", "foo"]), b"$3\r\nbar\r\n");
    }

    #[test]
    fn test_get_nonexistent() {
        let (mut handler, _) = create_handler();
        assert_eq!(run(&mut handler, &["GET", "nonexistent"]), b"$-1\r\n");
    }

    #[test]
    fn test_verb_is_case_insensitive() {
        let (mut handler, _) = create_handler();

        assert_eq!(run(&mut handler, &["set", "k", "v"]), b"+OK\r\n");
        assert_eq!(run(&mut handler, &["Get", "k"]), b"$1\r\nv\r\n");
    }

    #[test]
    fn test_set_with_expiry() {
        let (mut handler, clock) = create_handler();

        let request =
            decode(b"*5\r\n$3\r\nSET\r\n$3\r\nfoo\r\n$3\r\nbar\r\n$2\r\nPX\r\n$3\r\n100\r\n")
                .unwrap();
        assert_eq!(handler.execute(request).serialize(), b"+OK\r\n");
        assert_eq!(run(&mut handler, &["GET", "foo"]), b"$3\r\nbar\r\n");

        clock.advance(99);
        assert_eq!(run(&mut handler, &["GET", "foo"]), b"$3\r\nbar\r\n");

        clock.advance(1);
        assert_eq!(run(&mut handler, &["GET", "foo"]), b"$-1\r\n");
    }

    #[test]
    fn test_set_without_expiry_persists() {
        let (mut handler, clock) = create_handler();

        run(&mut handler, &["SET", "k", "v"]);
        clock.advance(365 * 24 * 60 * 60 * 1000);
        assert_eq!(run(&mut handler, &["GET", "k"]), b"$1\r\nv\r\n");
    }

    #[test]
    fn test_set_invalid_expiration_does_not_write() {
        let (mut handler, _) = create_handler();

        assert_eq!(
            run(&mut handler, &["SET", "foo", "bar", "PX", "notanumber"]),
            b"-ERR invalid expiration value\r\n"
        );
        assert_eq!(run(&mut handler, &["GET", "foo"]), b"$-1\r\n");
        assert!(handler.store().is_empty());
    }

    #[test]
    fn test_set_invalid_expiration_keeps_previous_value() {
        let (mut handler, _) = create_handler();

        run(&mut handler, &["SET", "foo", "old"]);
        run(&mut handler, &["SET", "foo", "new", "PX", "12abc"]);
        assert_eq!(run(&mut handler, &["GET", "foo"]), b"$3\r\nold\r\n");
    }

    #[test]
    fn test_overwrite() {
        let (mut handler, clock) = create_handler();

        run(&mut handler, &["SET", "k", "v1", "PX", "10"]);
        run(&mut handler, &["SET", "k", "v2"]);

        clock.advance(1_000);
        assert_eq!(run(&mut handler, &["GET", "k"]), b"$2\r\nv2\r\n");
        assert_eq!(handler.store().len(), 1);
    }

    #[test]
    fn test_arity_errors_do_not_mutate() {
        let (mut handler, _) = create_handler();

        let cases: Vec<(Vec<&str>, &str)> = vec![
            (vec!["ECHO"], "ECHO"),
            (vec!["ECHO", "a", "b"], "ECHO"),
            (vec!["SET", "mykey"], "SET"),
            (vec!["SET", "k", "v", "PX"], "SET"),
            (vec!["SET", "k", "v", "PX", "10", "extra"], "SET"),
            (vec!["GET"], "GET"),
            (vec!["GET", "a", "b"], "GET"),
            (vec!["CONFIG", "GET"], "CONFIG"),
            (vec!["SAVE", "now"], "SAVE"),
        ];

        for (args, verb) in cases {
            let expected = format!("-ERR wrong number of arguments for '{}' command\r\n", verb);
            assert_eq!(run(&mut handler, &args), expected.as_bytes(), "args: {:?}", args);
        }
        assert!(handler.store().is_empty());
        assert_eq!(handler.store().stats().set_ops, 0);
    }

    #[test]
    fn test_config_get() {
        let (mut handler, _) = create_handler();

        assert_eq!(
            run(&mut handler, &["CONFIG", "GET", "dir"]),
            b"*2\r\n$3\r\ndir\r\n$15\r\n/tmp/redis-data\r\n"
        );
        assert_eq!(
            run(&mut handler, &["CONFIG", "GET", "dbfilename"]),
            b"*2\r\n$10\r\ndbfilename\r\n$7\r\nrdbfile\r\n"
        );
    }

    #[test]
    fn test_config_unsupported_parameter() {
        let (mut handler, _) = create_handler();

        assert_eq!(
            run(&mut handler, &["CONFIG", "GET", "unsupported"]),
            b"-ERR unsupported CONFIG parameter\r\n"
        );
        assert_eq!(
            run(&mut handler, &["CONFIG", "SET", "dir"]),
            b"-ERR unsupported CONFIG parameter\r\n"
        );
    }

    #[test]
    fn test_config_subcommand_is_case_sensitive() {
        let (mut handler, _) = create_handler();

        // The verb is case-insensitive, the subcommand is not
        assert_eq!(
            run(&mut handler, &["config", "GET", "dir"]),
            b"*2\r\n$3\r\ndir\r\n$15\r\n/tmp/redis-data\r\n"
        );
        assert_eq!(
            run(&mut handler, &["CONFIG", "get", "dir"]),
            b"-ERR unsupported CONFIG parameter\r\n"
        );
    }

    #[test]
    fn test_save_writes_header() {
        let dir = tempfile::tempdir().unwrap();
        let snapshot = SnapshotConfig {
            dir: dir.path().join("nested").to_string_lossy().into_owned(),
            dbfilename: "dump.rdb".to_string(),
        };
        let mut handler =
            CommandHandler::with_parts(Store::new(), Box::new(SystemClock), snapshot.clone());

        assert_eq!(run(&mut handler, &["SAVE"]), b"+OK\r\n");
        assert_eq!(fs::read(snapshot.path()).unwrap(), SNAPSHOT_HEADER);
    }

    #[test]
    fn test_save_failure() {
        let dir = tempfile::tempdir().unwrap();
        // A regular file where the directory should be
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, b"x").unwrap();

        let snapshot = SnapshotConfig {
            dir: blocker.to_string_lossy().into_owned(),
            dbfilename: "rdbfile".to_string(),
        };
        let mut handler =
            CommandHandler::with_parts(Store::new(), Box::new(SystemClock), snapshot);

        assert_eq!(
            run(&mut handler, &["SAVE"]),
            b"-ERR failed to save data to file\r\n"
        );
    }

    #[test]
    fn test_unknown_command() {
        let (mut handler, _) = create_handler();

        for verb in ["INVALID", "DEL", "FLUSHALL", "QUIT"] {
            assert_eq!(run(&mut handler, &[verb]), b"-ERR unknown command\r\n");
        }
        assert_eq!(
            handler.execute(RespValue::array(vec![])).serialize(),
            b"-ERR unknown command\r\n"
        );
    }

    #[test]
    fn test_unsupported_frame_types() {
        let (mut handler, _) = create_handler();

        for frame in [
            RespValue::integer(1),
            RespValue::error("ERR boom"),
            RespValue::bulk_string(Bytes::from("PING")),
            RespValue::null_bulk_string(),
            RespValue::null_array(),
        ] {
            assert_eq!(
                handler.execute(frame).serialize(),
                b"-ERR unsupported RESP type\r\n"
            );
        }
    }

    #[test]
    fn test_non_string_argument() {
        let (mut handler, _) = create_handler();

        let frame = RespValue::array(vec![
            RespValue::bulk_string(Bytes::from("SET")),
            RespValue::bulk_string(Bytes::from("k")),
            RespValue::integer(5),
        ]);
        assert_eq!(handler.execute(frame).serialize(), b"-ERR invalid argument\r\n");
        assert!(handler.store().is_empty());
    }
}
