pub mod energy_data_queries;
