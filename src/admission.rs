//! Per-caller, per-operation request budgets.
//!
//! Each `(CallerIdentity, Operation)` pair gets a fixed window that opens on
//! its first request. The whole table sits behind one lock, so the check and
//! the increment happen together and a burst of concurrent requests cannot
//! slip past a budget.

use std::collections::HashMap;
use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;
use std::time::{Duration, Instant};

use log::debug;
use parking_lot::Mutex;
use serde::de::{self, Deserialize, Deserializer, Unexpected, Visitor};

use crate::errors::*;

/// Tables larger than this get their expired windows swept out.
const PRUNE_THRESHOLD: usize = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Sign,
    Verify,
    PublicKey,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Operation::Sign => write!(f, "sign"),
            Operation::Verify => write!(f, "verify"),
            Operation::PublicKey => write!(f, "public-key"),
        }
    }
}

/// Where a request came from. Only ever used as a budget key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallerIdentity {
    Ip(IpAddr),
    /// No address at all; every such request shares one budget.
    Unknown,
}

impl From<Option<IpAddr>> for CallerIdentity {
    fn from(ip: Option<IpAddr>) -> Self {
        ip.map_or(CallerIdentity::Unknown, CallerIdentity::Ip)
    }
}

impl fmt::Display for CallerIdentity {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            CallerIdentity::Ip(ip) => write!(f, "{}", ip),
            CallerIdentity::Unknown => write!(f, "<unknown>"),
        }
    }
}

/// `max_requests` per `window`, written like `"10 per minute"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quota {
    max_requests: u32,
    window: Duration,
}

impl Quota {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Quota {
            max_requests,
            window,
        }
    }

    pub fn per_minute(max_requests: u32) -> Self {
        Self::new(max_requests, Duration::from_secs(60))
    }

    pub fn max_requests(&self) -> u32 {
        self.max_requests
    }

    pub fn window(&self) -> Duration {
        self.window
    }
}

impl FromStr for Quota {
    type Err = Error;

    /// Accepts `"<N> per <unit>"`, `"<N> per <M> <units>"` and `"<N>/<unit>"`
    /// with units of second, minute, hour or day.
    fn from_str(s: &str) -> Result<Self> {
        let invalid = || Error::from(ErrorKind::InvalidQuota(s.to_string()));

        let lowered = s.trim().to_ascii_lowercase();
        let (count, period) = match lowered.split_once('/') {
            Some(split) => split,
            None => lowered.split_once(" per ").ok_or_else(invalid)?,
        };

        let max_requests: u32 = count.trim().parse().map_err(|_| invalid())?;

        let mut words = period.split_whitespace();
        let (multiplier, unit) = match (words.next(), words.next(), words.next()) {
            (Some(unit), None, None) => (1, unit),
            (Some(n), Some(unit), None) => (n.parse::<u64>().map_err(|_| invalid())?, unit),
            _ => return Err(invalid()),
        };

        let unit_secs = match unit.trim_end_matches('s') {
            "second" | "sec" => 1,
            "minute" | "min" => 60,
            "hour" => 60 * 60,
            "day" => 24 * 60 * 60,
            _ => return Err(invalid()),
        };

        if max_requests == 0 || multiplier == 0 {
            return Err(invalid());
        }

        Ok(Quota::new(max_requests, Duration::from_secs(multiplier * unit_secs)))
    }
}

impl<'de> Deserialize<'de> for Quota {
    fn deserialize<D>(deserializer: D) -> ::std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct QuotaVisitor;

        impl<'de> Visitor<'de> for QuotaVisitor {
            type Value = Quota;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                write!(formatter, "a quota such as \"10 per minute\"")
            }

            fn visit_str<E>(self, s: &str) -> ::std::result::Result<Self::Value, E>
            where
                E: de::Error,
            {
                s.parse()
                    .map_err(|_| de::Error::invalid_value(Unexpected::Str(s), &self))
            }
        }

        deserializer.deserialize_str(QuotaVisitor)
    }
}

/// One quota per operation. Signing is the tight one.
#[derive(Debug, Clone, Deserialize)]
pub struct Budgets {
    #[serde(default = "default_sign")]
    pub sign: Quota,
    #[serde(default = "default_verify")]
    pub verify: Quota,
    #[serde(default = "default_public_key")]
    pub public_key: Quota,
}

fn default_sign() -> Quota {
    Quota::per_minute(10)
}

fn default_verify() -> Quota {
    Quota::per_minute(20)
}

fn default_public_key() -> Quota {
    Quota::per_minute(100)
}

impl Default for Budgets {
    fn default() -> Self {
        Budgets {
            sign: default_sign(),
            verify: default_verify(),
            public_key: default_public_key(),
        }
    }
}

impl Budgets {
    pub fn quota(&self, op: Operation) -> Quota {
        match op {
            Operation::Sign => self.sign,
            Operation::Verify => self.verify,
            Operation::PublicKey => self.public_key,
        }
    }

    fn shortest_window(&self) -> Duration {
        self.sign
            .window()
            .min(self.verify.window())
            .min(self.public_key.window())
    }
}

#[derive(Debug)]
struct Window {
    opened: Instant,
    used: u32,
}

struct Table {
    windows: HashMap<(CallerIdentity, Operation), Window>,
    last_sweep: Instant,
    sweeps: u64,
}

pub struct AdmissionControl {
    budgets: Budgets,
    table: Mutex<Table>,
}

impl AdmissionControl {
    pub fn new(budgets: Budgets) -> Self {
        AdmissionControl {
            budgets,
            table: Mutex::new(Table {
                windows: HashMap::new(),
                last_sweep: Instant::now(),
                sweeps: 0,
            }),
        }
    }

    /// Spend one request of `who`'s budget for `op`, or fail with
    /// `RateLimited` carrying the whole seconds until the window reopens.
    pub fn check(&self, who: CallerIdentity, op: Operation) -> Result<()> {
        self.check_at(who, op, Instant::now())
    }

    pub fn check_at(&self, who: CallerIdentity, op: Operation, now: Instant) -> Result<()> {
        let quota = self.budgets.quota(op);
        let mut table = self.table.lock();

        // at most one sweep per shortest window, however full the table
        if table.windows.len() >= PRUNE_THRESHOLD
            && now.saturating_duration_since(table.last_sweep) >= self.budgets.shortest_window()
        {
            let budgets = &self.budgets;
            table.windows.retain(|&(_, op), w| {
                now.saturating_duration_since(w.opened) < budgets.quota(op).window()
            });
            table.last_sweep = now;
            table.sweeps += 1;
            debug!(
                "admission sweep {}: {} windows still live",
                table.sweeps,
                table.windows.len()
            );
        }

        let window = table.windows.entry((who, op)).or_insert(Window {
            opened: now,
            used: 0,
        });

        if now.saturating_duration_since(window.opened) >= quota.window() {
            window.opened = now;
            window.used = 0;
        }

        if window.used >= quota.max_requests() {
            let elapsed = now.saturating_duration_since(window.opened);
            bail!(ErrorKind::RateLimited(whole_secs(quota.window() - elapsed)));
        }

        window.used += 1;
        Ok(())
    }

    #[cfg(test)]
    fn tracked(&self) -> usize {
        self.table.lock().windows.len()
    }

    #[cfg(test)]
    fn sweeps(&self) -> u64 {
        self.table.lock().sweeps
    }
}

fn whole_secs(wait: Duration) -> u64 {
    let secs = wait.as_secs() + u64::from(wait.subsec_nanos() > 0);
    secs.max(1)
}
