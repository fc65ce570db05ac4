use arrayvec::ArrayString;

/// Minecraft player name - max 16 characters, stored inline (no heap allocation).
pub type PlayerName = ArrayString<16>;

/// Result of a whitelist insert for one owner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddOutcome {
  /// The name was appended to the owner's sequence.
  Added,
  /// A case-insensitive match already exists; nothing changed.
  AlreadyPresent,
  /// The owner's sequence is at its configured maximum; nothing changed.
  LimitReached,
}

/// Result of a whitelist removal for one owner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoveOutcome {
  /// The named entry was removed; carries the name as it was stored.
  Removed(PlayerName),
  /// No case-insensitive match in the owner's sequence.
  NotFound,
  /// The owner has no entries to pop.
  Empty,
}
