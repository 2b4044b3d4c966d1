//! ISO-8601 durations (`PT1M30S`, `P0D`, `PT0.5S`) as [si::Time]

use crate::imports::*;
use serde::de::{self, Visitor};
use serde::{Deserializer, Serializer};

/// Parses an ISO-8601 duration made of day, hour, minute and second designators, negated by a
/// leading `-`
pub fn parse(s: &str) -> anyhow::Result<si::Time> {
    let trimmed = s.trim();
    if let Some(positive) = trimmed.strip_prefix('-') {
        ensure!(!positive.starts_with('-'), "Duration {s:?} has two signs");
        return Ok(-parse(positive)?);
    }
    let body = trimmed
        .strip_prefix('P')
        .with_context(|| format!("Duration {s:?} must start with `P`"))?;
    let (date, time) = match body.split_once('T') {
        Some((date, time)) => {
            ensure!(!time.is_empty(), "Duration {s:?} has an empty time part");
            (date, Some(time))
        }
        None => (body, None),
    };
    ensure!(
        !date.is_empty() || time.is_some(),
        "Duration {s:?} has no components"
    );

    let mut seconds = 0.0;
    let mut parse_part = |part: &str, units: &[(char, f64)]| -> anyhow::Result<()> {
        let mut number = String::new();
        let mut allowed = units.iter();
        for c in part.chars() {
            if c.is_ascii_digit() || c == '.' || c == ',' {
                number.push(if c == ',' { '.' } else { c });
                continue;
            }
            let (_, factor) = allowed
                .find(|(unit, _)| *unit == c)
                .with_context(|| format!("Unexpected designator `{c}` in duration {s:?}"))?;
            let value: f64 = number
                .parse()
                .with_context(|| format!("Invalid number before `{c}` in duration {s:?}"))?;
            seconds += value * factor;
            number.clear();
        }
        ensure!(number.is_empty(), "Duration {s:?} ends without a designator");
        Ok(())
    };
    parse_part(date, &[('D', 86_400.0)])?;
    if let Some(time) = time {
        parse_part(time, &[('H', 3600.0), ('M', 60.0), ('S', 1.0)])?;
    }
    Ok(seconds * uc::S)
}

/// Formats `time` as an ISO-8601 duration, e.g. `PT1H2M3.5S`, or `-PT30S` before the origin
pub fn format(time: si::Time) -> String {
    let total = time.get::<si::second>();
    if total == 0.0 {
        return "PT0S".into();
    }
    if total < 0.0 {
        return format!("-{}", format(-time));
    }
    let hours = (total / 3600.0).floor();
    let minutes = ((total - hours * 3600.0) / 60.0).floor();
    let seconds = total - hours * 3600.0 - minutes * 60.0;
    let mut out = String::from("PT");
    if hours > 0.0 {
        out.push_str(&format!("{hours}H"));
    }
    if minutes > 0.0 {
        out.push_str(&format!("{minutes}M"));
    }
    if seconds > 0.0 {
        out.push_str(&format!("{seconds}S"));
    }
    out
}

struct DurationVisitor;

impl Visitor<'_> for DurationVisitor {
    type Value = si::Time;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("an ISO-8601 duration, e.g. `\"PT1M30S\"`")
    }

    fn visit_string<E>(self, v: String) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        Self::visit_str(self, &v)
    }

    fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        parse(v).map_err(|err| de::Error::custom(format!("{err:#}")))
    }
}

/// `#[serde(with = "iso8601")]` for [si::Time] fields
pub mod iso8601 {
    use super::*;

    pub fn serialize<S: Serializer>(time: &si::Time, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format(*time))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<si::Time, D::Error> {
        deserializer.deserialize_string(DurationVisitor)
    }

    /// `#[serde(with = "iso8601::option")]` for `Option<si::Time>` fields
    pub mod option {
        use super::*;

        #[derive(Serialize, Deserialize)]
        #[serde(transparent)]
        struct Wrapper(#[serde(with = "crate::timetable::duration::iso8601")] si::Time);

        pub fn serialize<S: Serializer>(
            time: &Option<si::Time>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            time.map(Wrapper).serialize(serializer)
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<si::Time>, D::Error> {
            Ok(Option::<Wrapper>::deserialize(deserializer)?.map(|w| w.0))
        }
    }
}
