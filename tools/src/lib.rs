//! Offline tooling behind the `dict-tools` binary: raw table conversion,
//! prefix-index snapshots and table statistics.

pub mod convert_table;
pub mod index;
