pub mod area_resize;
pub mod region_extractor;
