/*!
Générateurs de lignes syslog pour les tests

Produit des lignes au format rsyslog traditionnel, identiques à ce que
ptp4l et phc2sys écrivent sur les workers du testbed.
*/

use chrono::{Duration, NaiveDateTime};

/// Helper pour créer des lignes syslog ptp4l / phc2sys
pub struct SyslogLineBuilder {
    hostname: String,
    uptime_secs: f64,
}

impl SyslogLineBuilder {
    pub fn new<S: Into<String>>(hostname: S) -> Self {
        Self {
            hostname: hostname.into(),
            uptime_secs: 5201.113,
        }
    }

    fn stamp(at: NaiveDateTime) -> String {
        // "Oct  9 08:00:01" : jour aligné sur deux colonnes comme rsyslog
        at.format("%b %e %H:%M:%S").to_string()
    }

    /// Ligne ptp4l "master offset" (15 tokens, offset en position 8)
    pub fn ptp4l(&self, at: NaiveDateTime, offset_ns: i64) -> String {
        format!(
            "{} {} ptp4l[812]: [{:.3}] master offset {} s2 freq +3345 path delay 611",
            Self::stamp(at),
            self.hostname,
            self.uptime_secs,
            offset_ns
        )
    }

    /// Ligne phc2sys "phc offset" (15 tokens, offset en position 9)
    pub fn phc2sys(&self, at: NaiveDateTime, offset_ns: i64) -> String {
        format!(
            "{} {} phc2sys[813]: [{:.3}] CLOCK_REALTIME phc offset {} s2 freq -1234 delay 512",
            Self::stamp(at),
            self.hostname,
            self.uptime_secs,
            offset_ns
        )
    }

    /// Ligne ptp4l avec une valeur d'offset brute (pour les cas invalides)
    pub fn ptp4l_raw_offset(&self, at: NaiveDateTime, offset: &str) -> String {
        format!(
            "{} {} ptp4l[812]: [{:.3}] master offset {} s2 freq +3345 path delay 611",
            Self::stamp(at),
            self.hostname,
            self.uptime_secs,
            offset
        )
    }

    /// Ligne ptp4l d'état, ignorée par le parseur (mauvais nombre de tokens)
    pub fn ptp4l_state_change(&self, at: NaiveDateTime) -> String {
        format!(
            "{} {} ptp4l[812]: [{:.3}] port 1: UNCALIBRATED to SLAVE on MASTER_CLOCK_SELECTED",
            Self::stamp(at),
            self.hostname,
            self.uptime_secs
        )
    }

    /// Série de lignes ptp4l espacées d'une seconde, la dernière à `end`
    pub fn ptp4l_series(&self, end: NaiveDateTime, offsets: &[i64]) -> Vec<String> {
        Self::spread(end, offsets.len())
            .zip(offsets)
            .map(|(at, &offset)| self.ptp4l(at, offset))
            .collect()
    }

    /// Série de lignes phc2sys espacées d'une seconde, la dernière à `end`
    pub fn phc2sys_series(&self, end: NaiveDateTime, offsets: &[i64]) -> Vec<String> {
        Self::spread(end, offsets.len())
            .zip(offsets)
            .map(|(at, &offset)| self.phc2sys(at, offset))
            .collect()
    }

    fn spread(end: NaiveDateTime, count: usize) -> impl Iterator<Item = NaiveDateTime> {
        (0..count).map(move |i| end - Duration::seconds((count - 1 - i) as i64))
    }
}
