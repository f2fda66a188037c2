pub mod nu2flows;
pub mod hyper;
