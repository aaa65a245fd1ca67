use ultraviolet::{Mat4, Rotor3, Vec3, Vec4};

/// Affine transform applied to a voxel's local-space vertices when the
/// scene batch is built. Rotation is Euler angles in radians around the
/// x, y and z axes.
#[derive(Clone, Debug, PartialEq)]
pub struct Transform {
    pub translation: Vec3,
    pub rotation: Vec3,
    pub scale: Vec3,
}

impl Transform {
    pub fn from_translation(translation: Vec3) -> Self {
        Self {
            translation,
            ..Default::default()
        }
    }

    /// translate * rotate * scale, applied in that order to
    /// homogeneous local-space positions.
    pub fn matrix(&self) -> Mat4 {
        let rotation = Rotor3::from_euler_angles(self.rotation.z, self.rotation.x, self.rotation.y)
            .into_matrix()
            .into_homogeneous();

        Mat4::from_translation(self.translation)
            * rotation
            * Mat4::from_nonuniform_scale(self.scale)
    }

    pub fn transform_point(&self, point: Vec3) -> Vec3 {
        (self.matrix() * Vec4::new(point.x, point.y, point.z, 1.0)).xyz()
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            translation: Vec3::zero(),
            rotation: Vec3::zero(),
            scale: Vec3::one(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_vec3_near(a: Vec3, b: Vec3) {
        assert!(
            (a - b).mag() < 1e-5,
            "expected {:?} to be close to {:?}",
            b,
            a
        );
    }

    #[test]
    fn identity_leaves_points_unchanged() {
        let transform = Transform::default();
        assert_vec3_near(
            transform.transform_point(Vec3::new(1.0, 2.0, 3.0)),
            Vec3::new(1.0, 2.0, 3.0),
        );
    }

    #[test]
    fn translation_offsets_points() {
        let transform = Transform::from_translation(Vec3::new(5.0, 0.0, -1.0));
        assert_vec3_near(
            transform.transform_point(Vec3::zero()),
            Vec3::new(5.0, 0.0, -1.0),
        );
    }

    #[test]
    fn scale_is_applied_before_translation() {
        let transform = Transform {
            translation: Vec3::new(1.0, 0.0, 0.0),
            rotation: Vec3::zero(),
            scale: Vec3::new(2.0, 2.0, 2.0),
        };
        // T * S: the point is scaled first, then translated.
        assert_vec3_near(
            transform.transform_point(Vec3::new(1.0, 1.0, 1.0)),
            Vec3::new(3.0, 2.0, 2.0),
        );
    }

    #[test]
    fn rotation_around_y_fixes_the_y_axis_and_preserves_length() {
        let transform = Transform {
            translation: Vec3::zero(),
            rotation: Vec3::new(0.0, std::f32::consts::FRAC_PI_2, 0.0),
            scale: Vec3::one(),
        };
        assert_vec3_near(
            transform.transform_point(Vec3::new(0.0, 2.0, 0.0)),
            Vec3::new(0.0, 2.0, 0.0),
        );

        let rotated = transform.transform_point(Vec3::new(1.0, 0.0, 0.0));
        assert!((rotated.mag() - 1.0).abs() < 1e-5);
        // A quarter turn about y moves +x onto the z axis.
        assert!(rotated.x.abs() < 1e-5 && rotated.z.abs() > 0.999);
    }

    #[test]
    fn rotation_is_applied_after_scale_and_before_translation() {
        let transform = Transform {
            translation: Vec3::new(10.0, 0.0, 0.0),
            rotation: Vec3::new(0.0, std::f32::consts::PI, 0.0),
            scale: Vec3::new(2.0, 1.0, 1.0),
        };
        // (1,0,0) scales to (2,0,0), a half turn about y flips it to
        // (-2,0,0), and translation moves it to (8,0,0).
        assert_vec3_near(
            transform.transform_point(Vec3::new(1.0, 0.0, 0.0)),
            Vec3::new(8.0, 0.0, 0.0),
        );
    }
}
