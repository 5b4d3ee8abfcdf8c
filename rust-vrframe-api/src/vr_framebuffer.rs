/// How the eye framebuffers of a renderer were set up.
/// Fixed when the renderer is created.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde-serialization", derive(Deserialize, Serialize))]
pub struct VRFramebufferAttributes {
    // One 2-layer framebuffer renders both eyes in a single pass.
    pub multiview: bool,
    pub depth: bool,
    // Number of samples per pixel, 1 when multisampling is off.
    pub samples: u32,
    pub width: u32,
    pub height: u32,
}

impl Default for VRFramebufferAttributes {
    fn default() -> VRFramebufferAttributes {
        VRFramebufferAttributes {
            multiview: false,
            depth: true,
            samples: 1,
            width: 0,
            height: 0,
        }
    }
}

impl VRFramebufferAttributes {
    /// Number of framebuffers needed to cover both eyes.
    pub fn num_buffers(&self) -> usize {
        if self.multiview { 1 } else { 2 }
    }

    pub fn viewport(&self) -> VRViewport {
        VRViewport::new(0, 0, self.width as i32, self.height as i32)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde-serialization", derive(Deserialize, Serialize))]
pub struct VRViewport {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl VRViewport {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x: x,
            y: y,
            width: width,
            height: height,
        }
    }

    /// The four one pixel wide strips along the edges: bottom, top, left, right.
    pub fn border_strips(&self) -> [VRViewport; 4] {
        [VRViewport::new(self.x, self.y, self.width, 1),
         VRViewport::new(self.x, self.y + self.height - 1, self.width, 1),
         VRViewport::new(self.x, self.y, 1, self.height),
         VRViewport::new(self.x + self.width - 1, self.y, 1, self.height)]
    }
}
