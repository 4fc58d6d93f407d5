pub mod fft;

pub use fft::CenteredFft2;
