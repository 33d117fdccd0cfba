pub mod audio;
pub mod blink;
pub mod emotion;
pub mod eye_state;
pub mod face_locator;
pub mod face_quality;
pub mod head_pose;
pub mod history;
pub mod yawn;
