// Library exports for nfesort crate
// This allows tests and other crates to use the modules

pub mod attachment_parser;
pub mod cnpj_extractor;
pub mod config;
pub mod email_processor;
pub mod file_router;
pub mod imap_client;
