pub mod console_host;
pub mod identify;
pub mod run;
