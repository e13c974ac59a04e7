//! Keyword classifier assigning the topical category of an item.
//!
//! Precedence: an item already in `hand` stays there; otherwise a hand keyword
//! beats a humanoid keyword, which beats the seed. Matching is plain
//! substring search on the lowercased title and summary, in English and
//! Korean, so the same rules work before and after translation.
use crate::storage::Category;

const HAND_KEYWORDS: &[&str] = &[
    "hand",
    "gripper",
    "finger",
    "manipulation",
    "dexterous",
    "tactile",
    "grasping",
    "핸드",
    "그리퍼",
    "손",
    "매니퓰",
    "촉각",
    "파지",
];

const HUMANOID_KEYWORDS: &[&str] = &[
    "humanoid",
    "bipedal",
    "walking",
    "locomotion",
    "torso",
    "human-centered",
    "휴머노이드",
    "이족보행",
    "보행",
    "로코모션",
];

/// Classify an item from its text, starting from `seed`.
///
/// Total and idempotent: feeding the result back in as the seed returns the
/// same category.
pub fn classify(title: &str, summary: &str, seed: &Category) -> Category {
    if *seed == Category::Hand {
        return Category::Hand;
    }

    let text = format!("{} {}", title, summary).to_lowercase();

    if HAND_KEYWORDS.iter().any(|kw| text.contains(kw)) {
        return Category::Hand;
    }
    if HUMANOID_KEYWORDS.iter().any(|kw| text.contains(kw)) {
        return Category::Humanoid;
    }

    seed.clone()
}

/// Paper-sourced entries are archived only when keywords moved them out of
/// the paper bucket.
pub fn passes_paper_filter(source_seed: &Category, final_category: &Category) -> bool {
    !(source_seed.is_paper() && final_category.is_paper())
}
