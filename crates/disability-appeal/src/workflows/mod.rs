pub mod appeal;
