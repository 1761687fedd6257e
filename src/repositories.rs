pub mod referrals;
pub mod storage;
