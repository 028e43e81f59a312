use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

const FIRST_HALF: &str = "abcdefghijklm";
const SECOND_HALF: &str = "nopqrstuvwxyz";
const DIGITS: &str = "0123456789";

/// A partition of the word keyspace and the unit of shard ownership.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Category(pub String);

impl Category {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Bucket for input no indexed word can ever fall into.
    pub fn unknown() -> Self {
        Self("unknown".to_string())
    }

    pub fn is_unknown(&self) -> bool {
        self.0 == "unknown"
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The fixed category set a registry is created with, in assignment order.
pub fn all_categories() -> Vec<Category> {
    [
        "letter1part1",
        "letter1part2",
        "letter2part1",
        "letter2part2",
        "letter2part3",
        "#",
    ]
    .into_iter()
    .map(Category::new)
    .collect()
}

/// Maps any string to exactly one category.
///
/// Words starting with `a`..`m` split on whether the second letter is in
/// `a`..`f`; words starting with `n`..`z` split three ways on the second
/// letter (`n`..`t`, `u`..`z`, anything else). One-letter words go to the
/// first part of their half. Words starting with a digit go to `#`, and
/// everything else (including the empty string) is `unknown`.
pub fn category_of(word: &str) -> Category {
    let mut chars = word.chars();
    let Some(first) = chars.next() else {
        return Category::unknown();
    };
    let second = chars.next();

    let name = if FIRST_HALF.contains(first) {
        match second {
            Some(c) if !"abcdef".contains(c) => "letter1part2",
            _ => "letter1part1",
        }
    } else if SECOND_HALF.contains(first) {
        match second {
            None => "letter2part1",
            Some(c) if "nopqrst".contains(c) => "letter2part1",
            Some(c) if "uvwxyz".contains(c) => "letter2part2",
            Some(_) => "letter2part3",
        }
    } else if DIGITS.contains(first) {
        "#"
    } else {
        return Category::unknown();
    };

    Category::new(name)
}

/// Groups keywords by owning category, keeping each group's first-seen order
/// and dropping repeats.
pub fn group_by_category<I, S>(keywords: I) -> BTreeMap<Category, Vec<String>>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut groups: BTreeMap<Category, Vec<String>> = BTreeMap::new();
    for keyword in keywords {
        let keyword = keyword.as_ref();
        let group = groups.entry(category_of(keyword)).or_default();
        if !group.iter().any(|k| k == keyword) {
            group.push(keyword.to_string());
        }
    }
    groups
}
