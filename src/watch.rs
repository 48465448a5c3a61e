//! Watcher: periodically re-rendered view of tracked values.
//!
//! A `Watcher` owns two `SortedMap`s, one of variable probes and one of
//! function probes, plus a bounded tail of log lines. Producers register
//! probes through a shared reference; the renderer calls `frame()` to get the
//! text for one screen. Terminal handling (clearing, sizing, output capture)
//! is left to the caller.

use crate::error::Result;
use crate::rigid::SafeRigid;
use crate::sorted_map::SortedMap;
use core::fmt::{self, Display, Write as _};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{
    AtomicBool, AtomicI32, AtomicI64, AtomicIsize, AtomicU32, AtomicU64, AtomicUsize, Ordering,
};
use std::sync::Arc;
use tracing::debug;

/// Something whose current value can be rendered on demand.
pub trait Probe: Send + Sync {
    fn read(&self) -> String;
}

macro_rules! atomic_probe {
    ($($t:ty),* $(,)?) => {
        $(impl Probe for $t {
            fn read(&self) -> String {
                self.load(Ordering::Relaxed).to_string()
            }
        })*
    };
}

atomic_probe!(AtomicBool, AtomicI32, AtomicI64, AtomicIsize, AtomicU32, AtomicU64, AtomicUsize);

impl<T> Probe for parking_lot::RwLock<T>
where
    T: Display + Send + Sync,
{
    fn read(&self) -> String {
        parking_lot::RwLock::read(self).to_string()
    }
}

impl<T> Probe for parking_lot::Mutex<T>
where
    T: Display + Send,
{
    fn read(&self) -> String {
        self.lock().to_string()
    }
}

type VarProbe = Arc<dyn Probe>;
type FuncProbe = Arc<dyn Fn() -> String + Send + Sync>;

/// Escape sequences written before descriptions, values and log lines.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Palette {
    pub desc: String,
    pub value: String,
    pub log: String,
}

impl Default for Palette {
    fn default() -> Self {
        Self {
            desc: "\x1b[01;32m".to_string(),
            value: "\x1b[01;34m".to_string(),
            log: "\x1b[01;37m".to_string(),
        }
    }
}

impl Palette {
    /// Custom sequences. An empty string keeps the default for that slot.
    pub fn new(desc: impl Into<String>, value: impl Into<String>, log: impl Into<String>) -> Self {
        let base = Self::default();
        let pick = |s: String, fallback: String| if s.is_empty() { fallback } else { s };
        Self {
            desc: pick(desc.into(), base.desc),
            value: pick(value.into(), base.value),
            log: pick(log.into(), base.log),
        }
    }

    /// Foreground colours from the 256-colour table.
    pub fn ansi256(desc: u8, value: u8, log: u8) -> Self {
        let fg = |n: u8| format!("\x1b[38;5;{n}m");
        Self {
            desc: fg(desc),
            value: fg(value),
            log: fg(log),
        }
    }

    /// No escape sequences at all.
    pub fn plain() -> Self {
        Self {
            desc: String::new(),
            value: String::new(),
            log: String::new(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatcherConfig {
    /// Screen height in lines; log lines fill whatever the probes leave.
    pub rows: usize,
    /// Log lines retained between frames.
    pub log_lines: usize,
    pub palette: Palette,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            rows: 24,
            log_lines: 256,
            palette: Palette::default(),
        }
    }
}

impl WatcherConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

pub struct Watcher {
    config: WatcherConfig,
    vars: SortedMap<String, VarProbe>,
    funcs: SortedMap<String, FuncProbe>,
    log: SafeRigid<String>,
}

impl Default for Watcher {
    fn default() -> Self {
        Self::new(WatcherConfig::default())
    }
}

impl Watcher {
    pub fn new(config: WatcherConfig) -> Self {
        Self {
            log: SafeRigid::new(config.log_lines),
            vars: SortedMap::new(),
            funcs: SortedMap::new(),
            config,
        }
    }

    pub fn config(&self) -> &WatcherConfig {
        &self.config
    }

    /// Track a shared value under `desc`. Re-registering a description
    /// replaces the previous probe.
    pub fn var<P>(&self, desc: impl Into<String>, probe: Arc<P>)
    where
        P: Probe + 'static,
    {
        let desc = desc.into();
        debug!(%desc, "watching variable");
        self.vars.set(desc, probe);
    }

    /// Track the result of calling `f` on every frame.
    pub fn func<F, D>(&self, desc: impl Into<String>, f: F)
    where
        F: Fn() -> D + Send + Sync + 'static,
        D: Display,
    {
        let desc = desc.into();
        debug!(%desc, "watching function");
        self.funcs.set(desc, Arc::new(move || f().to_string()));
    }

    pub fn unwatch_var(&self, desc: &str) {
        debug!(desc, "unwatching variable");
        self.vars.delete(desc);
    }

    pub fn unwatch_func(&self, desc: &str) {
        debug!(desc, "unwatching function");
        self.funcs.delete(desc);
    }

    /// Number of registered probes.
    pub fn watched(&self) -> usize {
        self.vars.len() + self.funcs.len()
    }

    /// Append captured output. Each line is kept separately; the oldest
    /// lines fall off once `log_lines` is exceeded.
    pub fn log(&self, text: &str) {
        self.log.add(text.lines().map(str::to_owned));
    }

    /// Render one screen: variables, then functions, each in description
    /// order, then as many trailing log lines as still fit in `rows`.
    ///
    /// Probes are read after the maps' locks are released, so a probe may
    /// itself use the watcher.
    pub fn frame(&self) -> String {
        let p = &self.config.palette;
        let mut out = String::new();
        let mut lines = 0usize;

        for e in self.vars.iter() {
            let _ = writeln!(out, "{}{}{}{}", p.desc, e.key, p.value, e.value.read());
            lines += 1;
        }
        for e in self.funcs.iter() {
            let _ = writeln!(out, "{}{}{}{}", p.desc, e.key, p.value, (e.value)());
            lines += 1;
        }

        let room = self.config.rows.saturating_sub(lines);
        let tail = self.log.get_last(room);
        if !tail.is_empty() {
            out.push_str(&p.log);
            out.push_str(&tail.join("\n"));
        }
        out
    }
}

impl fmt::Debug for Watcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Watcher")
            .field("config", &self.config)
            .field("vars", &self.vars.keys())
            .field("funcs", &self.funcs.keys())
            .field("log", &self.log.len())
            .finish()
    }
}
