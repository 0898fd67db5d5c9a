/*-------------------------------------------------------------------------------------------------
  Core Modules
-------------------------------------------------------------------------------------------------*/

pub mod address_family;
pub mod client;
pub mod dataset;
pub mod errors;
pub mod feeds;
pub mod lookup_result;
pub mod range_record;
pub mod ranger;
pub mod registry;
pub mod utils;
