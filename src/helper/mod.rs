pub mod face_helper;

#[cfg(feature = "opencv")]
pub(crate) mod cv_backend;
#[cfg(feature = "opencv")]
pub(crate) use cv_backend as backend;

#[cfg(not(feature = "opencv"))]
pub(crate) mod image_backend;
#[cfg(not(feature = "opencv"))]
pub(crate) use image_backend as backend;
