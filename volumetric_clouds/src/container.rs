/// The box clouds live in, placed like any other object via position & scale.
///
/// Rotation is ignored, the container is always axis aligned.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ContainerTransform {
    /// World space center.
    pub position: glam::Vec3,
    /// Extent along each axis. Expected to be positive, this is not validated.
    pub scale: glam::Vec3,
}

impl Default for ContainerTransform {
    fn default() -> Self {
        Self {
            position: glam::Vec3::ZERO,
            scale: glam::vec3(100.0, 20.0, 100.0),
        }
    }
}

/// Cloud container bounds as handed to the shader.
///
/// Derived from the [`ContainerTransform`] every frame, never stored,
/// since the container may move or be rescaled at any time.
#[derive(Clone, Copy, Debug)]
pub struct ContainerBounds {
    pub bounding_box: macaw::BoundingBox,

    /// Voxel grid resolution, each extent rounded up to the next integer.
    pub grid_size: glam::UVec3,
}

impl ContainerBounds {
    pub fn resolve(transform: &ContainerTransform) -> Self {
        let ContainerTransform { position, scale } = *transform;

        // Negative scales are undefined, saturating to zero is as good as anything.
        let grid_size = scale.ceil().as_uvec3();

        Self {
            bounding_box: macaw::BoundingBox::from_center_size(position, scale),
            grid_size,
        }
    }

    #[inline]
    pub fn min(&self) -> glam::Vec3 {
        self.bounding_box.min
    }

    #[inline]
    pub fn max(&self) -> glam::Vec3 {
        self.bounding_box.max
    }
}
