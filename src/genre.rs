//! 評価対象のジャンル集合。
//!
//! 並び順は混同行列の行・列の順序を決めるため、変更しないこと。

/// Closed set of genre labels the model is expected to answer with.
pub const GENRES: [&str; 26] = [
    "sport",
    "news",
    "game-show",
    "horror",
    "fantasy",
    "western",
    "romance",
    "family",
    "adult",
    "documentary",
    "drama",
    "war",
    "action",
    "history",
    "musical",
    "reality-tv",
    "talk-show",
    "crime",
    "comedy",
    "animation",
    "short",
    "sci-fi",
    "biography",
    "music",
    "adventure",
    "mystery",
];

/// Number of labels in [`GENRES`].
pub const GENRE_COUNT: usize = GENRES.len();

/// ラベルの行列インデックスを返す。集合外なら `None`。
#[must_use]
pub fn index_of(label: &str) -> Option<usize> {
    GENRES.iter().position(|genre| *genre == label)
}

#[must_use]
pub fn is_genre(label: &str) -> bool {
    index_of(label).is_some()
}

/// 表の見出し用に先頭5文字へ切り詰める。
#[must_use]
pub fn short_label(label: &str) -> &str {
    match label.char_indices().nth(5) {
        Some((idx, _)) => &label[..idx],
        None => label,
    }
}
