//! Tools that work on Kraken2 and Bracken classification output.
pub mod combine_bracken;
pub mod extract_classified_reads;
