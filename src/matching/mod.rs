//! Matching stages: from a pitch record to ranked funds.
//!
//! 1. [`quality`]: drop placeholder values from the pitch and bad fund rows
//! 2. [`store`]: fetch candidate funds (Airtable or a JSON export)
//! 3. [`compare`]: literal rule, then the [`oracle`] for everything else
//! 4. [`score`]: weighted confidence for each full match
//! 5. [`rank`]: tie the above together and sort

pub mod compare;
pub mod oracle;
pub mod quality;
pub mod rank;
pub mod score;
pub mod store;
