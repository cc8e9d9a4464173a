//! Store keys for the non-sharded categories.
//!
//! Memory shard keys are derived per record; see `companion_types::shard`.

/// Key holding the character array.
pub const CHARACTERS_KEY: &str = "characters";

/// Key holding the lorebook array (entries nested inside books).
pub const LOREBOOKS_KEY: &str = "lorebooks";

/// Key holding the style-preference array.
pub const STYLE_PREFERENCES_KEY: &str = "style_preferences";
