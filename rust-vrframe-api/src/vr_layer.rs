use crate::VRPose;
use crate::vr_tracking::EYE_COUNT;

/// Opaque compositor-side texture swapchain identifier.
///
/// The two reserved values select the compositor's built-in swapchains,
/// matching the sentinel pointers used on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde-serialization", derive(Deserialize, Serialize))]
pub struct VRSwapChainId(pub u64);

impl VRSwapChainId {
    pub const NONE: VRSwapChainId = VRSwapChainId(0);
    // Solid black, used by the black projection layer.
    pub const DEFAULT: VRSwapChainId = VRSwapChainId(0x1);
    // The system loading spinner.
    pub const DEFAULT_LOADING_ICON: VRSwapChainId = VRSwapChainId(0x2);

    pub fn is_builtin(&self) -> bool {
        *self == VRSwapChainId::DEFAULT || *self == VRSwapChainId::DEFAULT_LOADING_ICON
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde-serialization", derive(Deserialize, Serialize))]
pub enum VRLayerType {
    Projection = 1,
    Cylinder = 3,
    Cube = 4,
    Equirect = 5,
    LoadingIcon = 6,
}

bitflags! {
    #[derive(Default)]
    #[cfg_attr(feature = "serde-serialization", derive(Deserialize, Serialize))]
    pub struct VRLayerFlags: u32 {
        const CHROMATIC_ABERRATION_CORRECTION = 1 << 1;
        const FIXED_TO_VIEW                   = 1 << 2;
        const SPIN                            = 1 << 3;
        const CLIP_TO_TEXTURE_RECT            = 1 << 4;
        const INHIBIT_SRGB_FRAMEBUFFER        = 1 << 8;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde-serialization", derive(Deserialize, Serialize))]
pub enum VRLayerBlend {
    Zero = 0,
    One = 1,
    SrcAlpha = 2,
    OneMinusSrcAlpha = 5,
}

// Properties shared by every layer kind.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde-serialization", derive(Deserialize, Serialize))]
pub struct VRLayerHeader {
    pub flags: VRLayerFlags,
    // RGBA multiplier applied while compositing.
    pub color_scale: [f32; 4],
    pub src_blend: VRLayerBlend,
    pub dst_blend: VRLayerBlend,
}

impl Default for VRLayerHeader {
    fn default() -> VRLayerHeader {
        VRLayerHeader {
            flags: VRLayerFlags::empty(),
            color_scale: [1.0, 1.0, 1.0, 1.0],
            src_blend: VRLayerBlend::One,
            dst_blend: VRLayerBlend::Zero,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde-serialization", derive(Deserialize, Serialize))]
pub struct VRSwapChainImage {
    pub swapchain: VRSwapChainId,
    pub index: u32,
}

impl VRSwapChainImage {
    pub fn new(swapchain: VRSwapChainId, index: u32) -> VRSwapChainImage {
        VRSwapChainImage { swapchain: swapchain, index: index }
    }
}

// Per-eye texture of a projection layer.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde-serialization", derive(Deserialize, Serialize))]
pub struct VRLayerTexture {
    pub image: VRSwapChainImage,
    // Maps (tanX, tanY, -1, 1) screen vectors to (s, t, q, _) texture coordinates.
    pub tex_coords_from_tan_angles: [f32; 16],
    // Sub-rectangle [x, y, w, h] of the [0, 1] texture range to sample from.
    pub texture_rect: [f32; 4],
}

impl Default for VRLayerTexture {
    fn default() -> VRLayerTexture {
        VRLayerTexture {
            image: VRSwapChainImage::default(),
            tex_coords_from_tan_angles: identity_matrix!(),
            texture_rect: [0.0, 0.0, 1.0, 1.0],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde-serialization", derive(Deserialize, Serialize))]
pub struct VRCylinderTexture {
    pub image: VRSwapChainImage,
    pub tex_coords_from_tan_angles: [f32; 16],
    pub texture_rect: [f32; 4],
    // Scale and bias applied after the cylinder mapping.
    pub texture_matrix: [f32; 16],
}

impl Default for VRCylinderTexture {
    fn default() -> VRCylinderTexture {
        VRCylinderTexture {
            image: VRSwapChainImage::default(),
            tex_coords_from_tan_angles: identity_matrix!(),
            texture_rect: [0.0, 0.0, 1.0, 1.0],
            texture_matrix: identity_matrix!(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde-serialization", derive(Deserialize, Serialize))]
pub struct VREquirectTexture {
    pub image: VRSwapChainImage,
    pub texture_rect: [f32; 4],
    pub texture_matrix: [f32; 16],
}

impl Default for VREquirectTexture {
    fn default() -> VREquirectTexture {
        VREquirectTexture {
            image: VRSwapChainImage::default(),
            texture_rect: [0.0, 0.0, 1.0, 1.0],
            texture_matrix: identity_matrix!(),
        }
    }
}

/// Stereo world view, the layer the renderer produces every frame.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde-serialization", derive(Deserialize, Serialize))]
pub struct VRProjectionLayer {
    pub header: VRLayerHeader,
    pub head_pose: VRPose,
    pub textures: [VRLayerTexture; EYE_COUNT],
}

impl VRProjectionLayer {
    /// A projection layer showing the compositor's solid black swapchain.
    pub fn black() -> VRProjectionLayer {
        let mut layer = VRProjectionLayer::default();
        for texture in layer.textures.iter_mut() {
            texture.image = VRSwapChainImage::new(VRSwapChainId::DEFAULT, 0);
        }
        layer
    }
}

/// A 2D texture wrapped around a cylinder.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde-serialization", derive(Deserialize, Serialize))]
pub struct VRCylinderLayer {
    pub header: VRLayerHeader,
    pub head_pose: VRPose,
    pub textures: [VRCylinderTexture; EYE_COUNT],
}

/// A cubemap at infinity, with an optional sampling offset in [-1, 1] space.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde-serialization", derive(Deserialize, Serialize))]
pub struct VRCubeLayer {
    pub header: VRLayerHeader,
    pub head_pose: VRPose,
    pub tex_coords_from_tan_angles: [f32; 16],
    pub offset: [f32; 3],
    pub textures: [VRSwapChainImage; EYE_COUNT],
}

impl Default for VRCubeLayer {
    fn default() -> VRCubeLayer {
        VRCubeLayer {
            header: VRLayerHeader::default(),
            head_pose: VRPose::default(),
            tex_coords_from_tan_angles: identity_matrix!(),
            offset: [0.0; 3],
            textures: [VRSwapChainImage::default(); EYE_COUNT],
        }
    }
}

/// An equirectangular texture at infinity.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde-serialization", derive(Deserialize, Serialize))]
pub struct VREquirectLayer {
    pub header: VRLayerHeader,
    pub head_pose: VRPose,
    pub tex_coords_from_tan_angles: [f32; 16],
    pub textures: [VREquirectTexture; EYE_COUNT],
}

impl Default for VREquirectLayer {
    fn default() -> VREquirectLayer {
        VREquirectLayer {
            header: VRLayerHeader::default(),
            head_pose: VRPose::default(),
            tex_coords_from_tan_angles: identity_matrix!(),
            textures: [VREquirectTexture::default(); EYE_COUNT],
        }
    }
}

/// Monoscopic spinning layer.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde-serialization", derive(Deserialize, Serialize))]
pub struct VRLoadingIconLayer {
    pub header: VRLayerHeader,
    // Radians per second.
    pub spin_speed: f32,
    pub spin_scale: f32,
    pub image: VRSwapChainImage,
}

impl Default for VRLoadingIconLayer {
    fn default() -> VRLoadingIconLayer {
        VRLoadingIconLayer {
            header: VRLayerHeader {
                src_blend: VRLayerBlend::SrcAlpha,
                dst_blend: VRLayerBlend::OneMinusSrcAlpha,
                ..VRLayerHeader::default()
            },
            spin_speed: 1.0,
            spin_scale: 16.0,
            image: VRSwapChainImage::new(VRSwapChainId::DEFAULT_LOADING_ICON, 0),
        }
    }
}

/// One compositable surface of a frame submission.
/// Later layers in a submission are composited on top of earlier ones.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde-serialization", derive(Deserialize, Serialize))]
pub enum VRLayer {
    Projection(VRProjectionLayer),
    Cylinder(VRCylinderLayer),
    Cube(VRCubeLayer),
    Equirect(VREquirectLayer),
    LoadingIcon(VRLoadingIconLayer),
}

impl VRLayer {
    pub fn layer_type(&self) -> VRLayerType {
        match *self {
            VRLayer::Projection(_) => VRLayerType::Projection,
            VRLayer::Cylinder(_) => VRLayerType::Cylinder,
            VRLayer::Cube(_) => VRLayerType::Cube,
            VRLayer::Equirect(_) => VRLayerType::Equirect,
            VRLayer::LoadingIcon(_) => VRLayerType::LoadingIcon,
        }
    }

    pub fn header(&self) -> &VRLayerHeader {
        match *self {
            VRLayer::Projection(ref layer) => &layer.header,
            VRLayer::Cylinder(ref layer) => &layer.header,
            VRLayer::Cube(ref layer) => &layer.header,
            VRLayer::Equirect(ref layer) => &layer.header,
            VRLayer::LoadingIcon(ref layer) => &layer.header,
        }
    }

    pub fn header_mut(&mut self) -> &mut VRLayerHeader {
        match *self {
            VRLayer::Projection(ref mut layer) => &mut layer.header,
            VRLayer::Cylinder(ref mut layer) => &mut layer.header,
            VRLayer::Cube(ref mut layer) => &mut layer.header,
            VRLayer::Equirect(ref mut layer) => &mut layer.header,
            VRLayer::LoadingIcon(ref mut layer) => &mut layer.header,
        }
    }

    pub fn flags(&self) -> VRLayerFlags {
        self.header().flags
    }

    pub fn with_flags(mut self, flags: VRLayerFlags) -> VRLayer {
        self.header_mut().flags |= flags;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loading_icon_defaults() {
        let icon = VRLoadingIconLayer::default();
        assert_eq!(icon.spin_speed, 1.0);
        assert_eq!(icon.spin_scale, 16.0);
        assert_eq!(icon.header.src_blend, VRLayerBlend::SrcAlpha);
        assert_eq!(icon.header.dst_blend, VRLayerBlend::OneMinusSrcAlpha);
        assert_eq!(icon.image.swapchain, VRSwapChainId::DEFAULT_LOADING_ICON);
    }

    #[test]
    fn black_projection_uses_builtin_swapchain() {
        let layer = VRProjectionLayer::black();
        assert!(layer.textures.iter().all(|t| t.image.swapchain == VRSwapChainId::DEFAULT));
        assert_eq!(layer.header.color_scale, [1.0; 4]);
        assert_eq!(layer.header.src_blend, VRLayerBlend::One);
        assert_eq!(layer.header.dst_blend, VRLayerBlend::Zero);
    }

    #[test]
    fn with_flags_accumulates() {
        let layer = VRLayer::Projection(VRProjectionLayer::default())
            .with_flags(VRLayerFlags::CHROMATIC_ABERRATION_CORRECTION)
            .with_flags(VRLayerFlags::INHIBIT_SRGB_FRAMEBUFFER);
        assert_eq!(layer.layer_type(), VRLayerType::Projection);
        assert!(layer.flags().contains(VRLayerFlags::CHROMATIC_ABERRATION_CORRECTION));
        assert!(layer.flags().contains(VRLayerFlags::INHIBIT_SRGB_FRAMEBUFFER));
        assert_eq!(layer.flags().bits(), (1 << 1) | (1 << 8));
    }
}
