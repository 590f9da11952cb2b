mod calc_service;

#[cfg(test)]
mod tests;

pub use calc_service::CalcService;
