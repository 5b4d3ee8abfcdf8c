#[cfg(feature = "gles")]
extern crate gl_generator;

#[cfg(feature = "gles")]
fn main() {
    use gl_generator::{Api, Fallbacks, Profile, Registry};
    use std::env;
    use std::fs::File;
    use std::path::Path;

    let out_dir = env::var("OUT_DIR").unwrap();

    // GLES 3.0 entry points gleam does not expose, loaded at runtime.
    let mut file = File::create(&Path::new(&out_dir).join("gles_ext_bindings.rs")).unwrap();
    let gles_reg = Registry::new(Api::Gles2, (3, 0), Profile::Core, Fallbacks::All, [
        "GL_OVR_multiview",
        "GL_OVR_multiview2",
        "GL_OVR_multiview_multisampled_render_to_texture",
        "GL_EXT_multisampled_render_to_texture",
        "GL_EXT_texture_border_clamp",
    ]);
    gles_reg.write_bindings(gl_generator::StructGenerator, &mut file)
            .unwrap();
}

#[cfg(not(feature = "gles"))]
fn main() {}
