//! The three joke APIs and how their bodies map onto [`Joke`].

use serde_json::Value;

use super::JokeError;
use crate::domain::Joke;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    /// official-joke-api: `{setup, punchline}`
    OfficialJokeApi,
    /// jokeapi.dev: `{type: "single", joke}` or `{setup, delivery}`
    JokeApiDev,
    /// icanhazdadjoke: `{joke}`, needs `Accept: application/json`
    ICanHazDadJoke,
}

impl Provider {
    /// Classify an endpoint by its host. `None` for anything unrecognized.
    pub fn classify(url: &str) -> Option<Self> {
        if url.contains("official-joke-api") {
            Some(Provider::OfficialJokeApi)
        } else if url.contains("jokeapi.dev") {
            Some(Provider::JokeApiDev)
        } else if url.contains("icanhazdadjoke") {
            Some(Provider::ICanHazDadJoke)
        } else {
            None
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Provider::OfficialJokeApi => "official-joke-api",
            Provider::JokeApiDev => "jokeapi.dev",
            Provider::ICanHazDadJoke => "icanhazdadjoke",
        }
    }

    /// Map a response body onto a joke. Missing or blank text is malformed.
    pub fn normalize(self, body: &Value) -> Result<Joke, JokeError> {
        match self {
            Provider::OfficialJokeApi => two_part(body, "setup", "punchline"),
            Provider::JokeApiDev => {
                if body.get("type").and_then(Value::as_str) == Some("single") {
                    single(body, "joke")
                } else {
                    two_part(body, "setup", "delivery")
                }
            }
            Provider::ICanHazDadJoke => single(body, "joke"),
        }
    }
}

fn text_field<'a>(body: &'a Value, key: &str) -> &'a str {
    body.get(key).and_then(Value::as_str).unwrap_or("").trim()
}

fn two_part(body: &Value, setup_key: &str, punchline_key: &str) -> Result<Joke, JokeError> {
    let setup = text_field(body, setup_key);
    if setup.is_empty() {
        return Err(JokeError::Malformed(format!("missing '{}'", setup_key)));
    }
    // an empty punchline is kept; enrichment turns it into a story
    Ok(Joke::TwoPart {
        setup: setup.to_string(),
        punchline: text_field(body, punchline_key).to_string(),
    })
}

fn single(body: &Value, key: &str) -> Result<Joke, JokeError> {
    let text = text_field(body, key);
    if text.is_empty() {
        return Err(JokeError::Malformed(format!("missing '{}'", key)));
    }
    Ok(Joke::Single {
        text: text.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_classify() {
        assert_eq!(
            Provider::classify("https://official-joke-api.appspot.com/random_joke"),
            Some(Provider::OfficialJokeApi)
        );
        assert_eq!(
            Provider::classify("https://v2.jokeapi.dev/joke/Any?type=single"),
            Some(Provider::JokeApiDev)
        );
        assert_eq!(
            Provider::classify("https://icanhazdadjoke.com/"),
            Some(Provider::ICanHazDadJoke)
        );
        assert_eq!(Provider::classify("https://example.com/jokes"), None);
    }

    #[test]
    fn test_jokeapi_two_part_uses_delivery() {
        let joke = Provider::JokeApiDev
            .normalize(&json!({"type": "twopart", "setup": "Knock knock", "delivery": "Who's there?"}))
            .unwrap();
        assert_eq!(
            joke,
            Joke::TwoPart {
                setup: "Knock knock".into(),
                punchline: "Who's there?".into()
            }
        );
    }

    #[test]
    fn test_malformed_bodies() {
        assert!(matches!(
            Provider::OfficialJokeApi.normalize(&json!({"punchline": "x"})),
            Err(JokeError::Malformed(_))
        ));
        assert!(matches!(
            Provider::ICanHazDadJoke.normalize(&json!({"joke": "   "})),
            Err(JokeError::Malformed(_))
        ));
        assert!(matches!(
            Provider::JokeApiDev.normalize(&json!([1, 2])),
            Err(JokeError::Malformed(_))
        ));
    }
}
