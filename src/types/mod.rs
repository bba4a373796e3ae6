pub mod calendar;
pub mod data_source;
pub mod forecast;
pub mod observation;
pub mod reconciled;
pub(crate) mod values;
