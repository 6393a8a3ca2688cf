pub mod battery;
pub mod boost;
pub mod boost_mode;
pub mod depletion;
pub mod efficiency;
pub mod energy_model;
pub mod forecast;
pub mod hour;
pub mod interval;
pub mod load;
pub mod settings;
pub mod shading;
pub mod status;
