//! The four analytics jobs, each expressed as stages over the engine.

pub mod frobenius;
pub mod keywords;
pub mod knn;
pub mod reverse_graph;
pub mod stopwords;
