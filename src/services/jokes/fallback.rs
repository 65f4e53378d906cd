//! Local jokes used when every API is down.

use rand::seq::IndexedRandom;

use crate::domain::Joke;

const TWO_PART: [(&str, &str); 5] = [
    (
        "Why don't scientists trust atoms?",
        "Because they make up everything!",
    ),
    ("What do you call a fake noodle?", "An impasta!"),
    (
        "Why did the scarecrow win an award?",
        "Because he was outstanding in his field!",
    ),
    ("What do you call a bear with no teeth?", "A gummy bear!"),
    ("Why don't eggs tell jokes?", "They'd crack each other up!"),
];

const ONE_LINERS: [&str; 3] = [
    "I told my wife she was drawing her eyebrows too high. She looked surprised.",
    "I invented a new word: Plagiarism!",
    "Why do programmers prefer dark mode? Because light attracts bugs!",
];

/// All eight, two-part first.
pub fn all() -> Vec<Joke> {
    TWO_PART
        .iter()
        .map(|(setup, punchline)| Joke::TwoPart {
            setup: setup.to_string(),
            punchline: punchline.to_string(),
        })
        .chain(ONE_LINERS.iter().map(|text| Joke::Single {
            text: text.to_string(),
        }))
        .collect()
}

pub fn random() -> Joke {
    let jokes = all();
    jokes
        .choose(&mut rand::rng())
        .cloned()
        .unwrap_or_else(|| jokes[0].clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fallback_list_shape() {
        let jokes = all();
        assert_eq!(jokes.len(), 8);
        assert_eq!(
            jokes[0],
            Joke::TwoPart {
                setup: "Why don't scientists trust atoms?".into(),
                punchline: "Because they make up everything!".into()
            }
        );
        let singles = jokes
            .iter()
            .filter(|j| matches!(j, Joke::Single { .. }))
            .count();
        assert_eq!(singles, 3);
    }
}
