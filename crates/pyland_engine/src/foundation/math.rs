//! Math utilities and types
//!
//! Thin aliases over `nalgebra` plus the handful of 2D projection helpers the
//! tile renderer needs.

pub use nalgebra::{Matrix4, Vector2, Vector3};

/// 2D vector type (tile coordinates)
pub type Vec2 = Vector2<f32>;

/// 2D integer vector type (pixel coordinates)
pub type IVec2 = Vector2<i32>;

/// 3D vector type
pub type Vec3 = Vector3<f32>;

/// 4x4 matrix type
pub type Mat4 = Matrix4<f32>;

/// Orthographic projection covering a window of `width` x `height` pixels.
///
/// Origin is the bottom-left corner, depth range is `[0, 1]`. Matches the
/// classic `glOrtho(0, w, 0, h, 0, 1)` used by the 2D pipeline.
pub fn pixel_projection(width: u32, height: u32) -> Mat4 {
    Mat4::new_orthographic(0.0, width as f32, 0.0, height as f32, 0.0, 1.0)
}

/// Translation in the XY plane.
pub fn translation_2d(x: f32, y: f32) -> Mat4 {
    Mat4::new_translation(&Vec3::new(x, y, 0.0))
}

/// Column-major float view of a matrix, ready for uniform upload.
pub fn as_column_slice(matrix: &Mat4) -> &[f32] {
    matrix.as_slice()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_pixel_projection_maps_corners() {
        let projection = pixel_projection(800, 600);

        let origin = projection.transform_point(&nalgebra::Point3::new(0.0, 0.0, 0.0));
        assert_relative_eq!(origin.x, -1.0);
        assert_relative_eq!(origin.y, -1.0);

        let far_corner = projection.transform_point(&nalgebra::Point3::new(800.0, 600.0, 0.0));
        assert_relative_eq!(far_corner.x, 1.0);
        assert_relative_eq!(far_corner.y, 1.0);
    }

    #[test]
    fn test_translation_2d_moves_points() {
        let matrix = translation_2d(-64.0, 32.0);
        let moved = matrix.transform_point(&nalgebra::Point3::new(10.0, 10.0, 0.0));

        assert_relative_eq!(moved.x, -54.0);
        assert_relative_eq!(moved.y, 42.0);
        assert_relative_eq!(moved.z, 0.0);
    }

    #[test]
    fn test_column_slice_is_column_major() {
        let matrix = translation_2d(3.0, 4.0);
        let slice = as_column_slice(&matrix);

        assert_eq!(slice.len(), 16);
        assert_relative_eq!(slice[12], 3.0);
        assert_relative_eq!(slice[13], 4.0);
    }
}
