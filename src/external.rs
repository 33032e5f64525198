pub mod ruas_api;
