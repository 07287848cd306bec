pub mod camera_image_graphic;
pub mod canvas;
pub mod face_contour_graphic;
pub mod face_graphic;
pub mod graphic;
pub mod graphic_overlay;
