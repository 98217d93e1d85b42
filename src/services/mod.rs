pub mod ai;
pub mod audit;
pub mod conversation;
pub mod dialog;
