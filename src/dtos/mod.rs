pub mod merchant_dtos;
