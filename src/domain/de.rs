// Lenient serde helpers for service payloads

use serde::{Deserialize, Deserializer};

/// Accept Option<u32> from either a number or a string like "12"; null/""/negative -> None.
pub fn opt_u32_from_str_or_num<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NumOrStr {
        Num(i64),
        Str(String),
    }

    let val: Option<NumOrStr> = Option::deserialize(deserializer)?;
    Ok(match val {
        None => None,
        Some(NumOrStr::Num(n)) => u32::try_from(n).ok(),
        Some(NumOrStr::Str(s)) => s.trim().parse::<u32>().ok(),
    })
}
