pub mod asset_class;
pub mod cell;
pub mod change;
pub mod quote;
pub mod record;
