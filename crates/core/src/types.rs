/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Seeds are carried as `u64`; generated seeds stay within `u32` range.
pub type Seed = u64;
