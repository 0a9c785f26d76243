//! Voice intent parsing.
//!
//! Device names are tried in registry order and the first one that appears
//! in the utterance decides the result, so `"light fan on"` turns on
//! whichever of the two is configured first.
//!
//! A device name must start at a word boundary: its first word may prefix a
//! heard word (`"lights"` names `Light`) and any later words match whole.
//! Keywords always match whole words. So `"spaceship"` does not name `AC`
//! and `"television"` does not contain the keyword `on`.

use crate::control::Intent;

const ON_PHRASES: &[&str] = &["turn on", "switch on", "on"];
const OFF_PHRASES: &[&str] = &["turn off", "switch off", "off"];

/// Lowercase words of `text`, split on anything that is not alphanumeric.
fn words(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect()
}

fn contains_sequence(haystack: &[String], needle: &[String]) -> bool {
    !needle.is_empty()
        && haystack
            .windows(needle.len())
            .any(|window| window == needle)
}

/// `name` appears in `heard`, its first word allowed to be a prefix.
fn names_device(heard: &[String], name: &[String]) -> bool {
    let Some((first, rest)) = name.split_first() else {
        return false;
    };
    heard
        .windows(name.len())
        .any(|window| window[0].starts_with(first.as_str()) && &window[1..] == rest)
}

fn contains_any(haystack: &[String], phrases: &[&str]) -> bool {
    phrases
        .iter()
        .any(|phrase| contains_sequence(haystack, &words(phrase)))
}

/// Requested state named in the utterance. ON is checked first.
fn action(words: &[String]) -> Option<bool> {
    if contains_any(words, ON_PHRASES) {
        Some(true)
    } else if contains_any(words, OFF_PHRASES) {
        Some(false)
    } else {
        None
    }
}

/// Map recognized text to an intent. `None` means no device + action pair.
pub fn parse<'a, I>(text: &str, devices: I) -> Option<Intent>
where
    I: IntoIterator<Item = &'a str>,
{
    let heard = words(text);
    if heard.is_empty() {
        return None;
    }

    let device = devices
        .into_iter()
        .find(|name| names_device(&heard, &words(name)))?;
    action(&heard).map(|on| Intent::new(device, on))
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Registry order for every fixture: Light, Fan, AC, TV.
    const DEVICES: [&str; 4] = ["Light", "Fan", "AC", "TV"];

    fn parse_default(text: &str) -> Option<Intent> {
        parse(text, DEVICES)
    }

    #[test]
    fn test_basic_commands() {
        assert_eq!(
            parse_default("turn on light"),
            Some(Intent::new("Light", true))
        );
        assert_eq!(
            parse_default("turn off fan"),
            Some(Intent::new("Fan", false))
        );
        assert_eq!(
            parse_default("Switch OFF the AC please"),
            Some(Intent::new("AC", false))
        );
        assert_eq!(parse_default("tv on"), Some(Intent::new("TV", true)));
    }

    #[test]
    fn test_unknown_device_is_no_match() {
        assert_eq!(parse_default("please turn on the spaceship"), None);
        assert_eq!(parse_default("turn off the television"), None);
    }

    #[test]
    fn test_plural_device_words() {
        assert_eq!(
            parse_default("turn on the lights"),
            Some(Intent::new("Light", true))
        );
        assert_eq!(
            parse_default("switch off the fans"),
            Some(Intent::new("Fan", false))
        );
        assert_eq!(
            parse("turn on the living rooms lamp", ["Living Room Lamp"]),
            None
        );
        // Only the start of a word can name a device
        assert_eq!(parse_default("turn on the spotlight"), None);
    }

    #[test]
    fn test_device_without_action_is_no_match() {
        assert_eq!(parse_default("light"), None);
        assert_eq!(parse_default("what is the fan doing"), None);
        assert_eq!(parse_default(""), None);
    }

    #[test]
    fn test_registry_order_wins_over_input_order() {
        assert_eq!(
            parse_default("light fan on"),
            Some(Intent::new("Light", true))
        );
        assert_eq!(
            parse_default("fan light on"),
            Some(Intent::new("Light", true))
        );

        let reordered = ["Fan", "Light"];
        assert_eq!(
            parse("light fan on", reordered),
            Some(Intent::new("Fan", true))
        );
    }

    #[test]
    fn test_on_takes_precedence_over_off() {
        assert_eq!(
            parse_default("turn the light off and on"),
            Some(Intent::new("Light", true))
        );
    }

    #[test]
    fn test_punctuation_and_multi_word_names() {
        assert_eq!(
            parse_default("Light, on!"),
            Some(Intent::new("Light", true))
        );
        assert_eq!(
            parse("turn off the living room lamp", ["Living Room Lamp"]),
            Some(Intent::new("Living Room Lamp", false))
        );
        assert_eq!(parse("turn off the living lamp", ["Living Room Lamp"]), None);
    }
}
