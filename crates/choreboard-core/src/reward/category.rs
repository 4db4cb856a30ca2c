//! Keyword groups that place chores into rooms / kinds of work.
//!
//! Matching works on the lowercase words of a task name, so "Unload
//! dishwasher" is a kitchen chore and "Clean bathroom sink" a bathroom one,
//! while "Answer email" is not an errand. A name may fall into several
//! categories or none.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChoreCategory {
    Kitchen,
    Bathroom,
    Laundry,
    Floors,
    Trash,
    Outdoor,
    Pets,
    Errands,
}

impl ChoreCategory {
    pub const ALL: [ChoreCategory; 8] = [
        ChoreCategory::Kitchen,
        ChoreCategory::Bathroom,
        ChoreCategory::Laundry,
        ChoreCategory::Floors,
        ChoreCategory::Trash,
        ChoreCategory::Outdoor,
        ChoreCategory::Pets,
        ChoreCategory::Errands,
    ];

    /// Lowercase keywords matched against whole words of a task name. A
    /// trailing `*` matches any word with that prefix; otherwise a plain
    /// plural (`-s`, `-es`) also matches. Spaces join consecutive words.
    pub fn keywords(self) -> &'static [&'static str] {
        match self {
            ChoreCategory::Kitchen => &[
                "kitchen", "dish*", "cook", "cooking", "oven", "fridge", "stove", "counter",
                "countertop", "microwave", "pantry", "meal", "lunch", "dinner", "breakfast",
            ],
            ChoreCategory::Bathroom => &[
                "bathroom", "toilet", "shower", "bath", "bathtub", "sink", "tub", "mirror",
            ],
            ChoreCategory::Laundry => &[
                "laundry", "fold", "folding", "ironing", "towel", "sheet", "bedding", "clothes",
                "washing",
            ],
            ChoreCategory::Floors => &[
                "vacuum", "vacuuming", "mop", "mopping", "sweep", "sweeping", "floor", "carpet",
                "rug", "hoover",
            ],
            ChoreCategory::Trash => &["trash", "garbage", "recycl*", "compost", "rubbish", "bin"],
            ChoreCategory::Outdoor => &[
                "garden", "gardening", "lawn", "mow", "mowing", "yard", "weed", "weeding", "leaves",
                "plant", "snow", "patio", "hedge",
            ],
            ChoreCategory::Pets => &["dog", "cat", "litter", "kitty", "aquarium", "fish", "feed the", "pet"],
            ChoreCategory::Errands => &[
                "grocer*", "shopping", "errand", "pharmacy", "post office", "mail", "mailbox",
            ],
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ChoreCategory::Kitchen => "kitchen",
            ChoreCategory::Bathroom => "bathroom",
            ChoreCategory::Laundry => "laundry",
            ChoreCategory::Floors => "floors",
            ChoreCategory::Trash => "trash",
            ChoreCategory::Outdoor => "outdoor",
            ChoreCategory::Pets => "pets",
            ChoreCategory::Errands => "errands",
        }
    }

    pub fn matches(self, task_name: &str) -> bool {
        self.matches_words(&words(task_name))
    }

    fn matches_words(self, words: &[String]) -> bool {
        self.keywords().iter().any(|keyword| {
            let parts: Vec<&str> = keyword.split(' ').collect();
            words
                .windows(parts.len())
                .any(|window| window.iter().zip(&parts).all(|(word, part)| word_matches(word, part)))
        })
    }
}

fn words(task_name: &str) -> Vec<String> {
    task_name
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_string)
        .collect()
}

fn word_matches(word: &str, keyword: &str) -> bool {
    match keyword.strip_suffix('*') {
        Some(stem) => word.starts_with(stem),
        None => {
            word == keyword
                || word.strip_suffix('s') == Some(keyword)
                || word.strip_suffix("es") == Some(keyword)
        }
    }
}

/// Every category `task_name` belongs to, in declaration order.
pub fn categories_of(task_name: &str) -> Vec<ChoreCategory> {
    let words = words(task_name);
    ChoreCategory::ALL
        .into_iter()
        .filter(|c| c.matches_words(&words))
        .collect()
}

/// True when the two names share at least one category.
pub fn share_category(a: &str, b: &str) -> bool {
    let left = categories_of(a);
    if left.is_empty() {
        return false;
    }
    categories_of(b).iter().any(|c| left.contains(c))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matching_is_case_insensitive_on_words() {
        assert!(ChoreCategory::Kitchen.matches("Unload DISHWASHER"));
        assert!(ChoreCategory::Laundry.matches("fold clothes"));
        assert!(!ChoreCategory::Kitchen.matches("Mow lawn"));
    }

    #[test]
    fn names_can_belong_to_several_categories() {
        let cats = categories_of("Wipe kitchen floor");
        assert_eq!(cats, vec![ChoreCategory::Kitchen, ChoreCategory::Floors]);
        assert!(categories_of("Call grandma").is_empty());
    }

    #[test]
    fn share_category_needs_one_common_group() {
        assert!(share_category("Wash dishes", "Clean the oven"));
        assert!(share_category("Wipe kitchen floor", "Vacuum hallway"));
        assert!(!share_category("Wash dishes", "Scrub toilet"));
        assert!(!share_category("Call grandma", "Call grandma"));
    }

    #[test]
    fn carpet_is_not_a_pet_chore() {
        assert!(!ChoreCategory::Pets.matches("Shampoo carpet"));
        assert!(ChoreCategory::Floors.matches("Shampoo carpet"));
    }

    #[test]
    fn keywords_do_not_match_inside_other_words() {
        assert!(categories_of("Environment report").is_empty());
        assert!(categories_of("Answer email").is_empty());
        assert!(!ChoreCategory::Kitchen.matches("Bake cookies"));
        assert!(categories_of("Pick up drugs").is_empty());
        assert!(!share_category("Answer email", "Check the mail"));
    }

    #[test]
    fn plurals_stems_and_phrases_still_match() {
        assert!(ChoreCategory::Floors.matches("Vacuum the rugs"));
        assert!(ChoreCategory::Trash.matches("Sort recycling"));
        assert!(ChoreCategory::Errands.matches("Buy groceries"));
        assert!(ChoreCategory::Errands.matches("Drop parcel at the post office"));
        assert!(ChoreCategory::Pets.matches("Feed the cat"));
        assert!(ChoreCategory::Laundry.matches("Ironing shirts"));
    }
}
