use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread;
use rust_vrframe_api::utils;
use rust_vrframe_api::{VRCompositorPtr, VRError, VRGpuContextFactory, VRPipelineSettings};
use crate::vr_frame_pipeline::{VRFrameProducer, VRFrameWork};

struct VRRenderThreadState {
    exit: bool,
    work_available: bool,
    work_done: bool,
    // The single work slot, overwritten by every submit.
    work: Option<VRFrameWork>,
    tid: u32,
    failure: Option<VRError>,
}

struct VRRenderThreadShared {
    state: Mutex<VRRenderThreadState>,
    work_available: Condvar,
    work_done: Condvar,
}

impl VRRenderThreadShared {
    // Every unlock point leaves the state consistent, so a panic elsewhere
    // does not invalidate it.
    fn lock(&self) -> MutexGuard<VRRenderThreadState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn wait_done(&self) -> MutexGuard<VRRenderThreadState> {
        let mut state = self.lock();
        while !state.work_done {
            state = self.work_done.wait(state).unwrap_or_else(|e| e.into_inner());
        }
        state
    }

    fn signal_done(&self, failure: Option<VRError>) {
        let mut state = self.lock();
        if failure.is_some() {
            state.failure = failure;
        }
        state.work_done = true;
        self.work_done.notify_one();
    }

    // Leaves the state as after a failed frame for good: nothing is taken
    // any more and every waiter is released.
    fn signal_exit(&self, failure: VRError) {
        let mut state = self.lock();
        state.exit = true;
        state.work = None;
        state.failure = Some(failure);
        state.work_done = true;
        self.work_done.notify_all();
    }

    fn next_work(&self) -> Option<VRFrameWork> {
        let mut state = self.lock();
        while !state.work_available {
            state = self.work_available.wait(state).unwrap_or_else(|e| e.into_inner());
        }
        state.work_available = false;
        if state.exit {
            return None;
        }
        state.work.take()
    }
}

// Releases the driving thread when the render thread unwinds.
struct VRRenderThreadExitGuard(Arc<VRRenderThreadShared>);

impl Drop for VRRenderThreadExitGuard {
    fn drop(&mut self) {
        if thread::panicking() {
            error!("Render thread panicked");
            self.0.signal_exit(VRError::RenderThread("render thread panicked".into()));
        }
    }
}

/// Renders and submits frames on a dedicated thread, at most one frame
/// behind the driving thread.
///
/// There is a single work slot: `submit` blocks until the previous frame has
/// been submitted before handing over the next one.
pub struct VRRenderThread {
    shared: Arc<VRRenderThreadShared>,
    thread: Option<thread::JoinHandle<()>>,
}

impl VRRenderThread {
    /// Starts the thread and waits until its context and renderer exist.
    pub fn create(mut factory: Box<dyn VRGpuContextFactory>,
                  compositor: VRCompositorPtr,
                  settings: VRPipelineSettings,
                  use_multiview: bool) -> Result<VRRenderThread, VRError> {
        let shared = Arc::new(VRRenderThreadShared {
            state: Mutex::new(VRRenderThreadState {
                exit: false,
                work_available: false,
                work_done: false,
                work: None,
                tid: 0,
                failure: None,
            }),
            work_available: Condvar::new(),
            work_done: Condvar::new(),
        });

        let thread_shared = shared.clone();
        let thread = thread::Builder::new().name("VR::Renderer".into()).spawn(move || {
            let shared = thread_shared;
            let _exit_guard = VRRenderThreadExitGuard(shared.clone());
            shared.lock().tid = utils::current_thread_id();

            let gpu = match factory.create_shared_context() {
                Ok(gpu) => gpu,
                Err(msg) => return shared.signal_done(Some(VRError::Gpu(msg))),
            };
            let mut producer = match VRFrameProducer::create(&*gpu, &*compositor, &settings, use_multiview) {
                Ok(producer) => producer,
                Err(e) => return shared.signal_done(Some(e)),
            };
            debug!("Render thread started");

            loop {
                shared.signal_done(None);
                let work = match shared.next_work() {
                    Some(work) => work,
                    None => break,
                };
                if let Err(e) = producer.execute(&*gpu, &*compositor, &work) {
                    error!("Render thread dropped frame {}: {}", work.frame_index, e);
                }
            }

            producer.destroy(&*gpu, &*compositor);
            // The shared context goes with `gpu`.
            drop(gpu);
            debug!("Render thread stopped");
        }).map_err(|e| VRError::RenderThread(e.to_string()))?;

        let mut render_thread = VRRenderThread {
            shared: shared,
            thread: Some(thread),
        };

        let failure = render_thread.shared.wait_done().failure.take();
        if let Some(e) = failure {
            render_thread.join()?;
            return Err(e);
        }
        Ok(render_thread)
    }

    /// Hands over the next frame once the previous one is done.
    pub fn submit(&self, work: VRFrameWork) {
        let mut state = self.shared.wait_done();
        if state.exit {
            error!("Render thread is gone, dropping frame {}", work.frame_index);
            return;
        }
        state.work_done = false;
        state.work = Some(work);
        state.work_available = true;
        self.shared.work_available.notify_one();
    }

    /// Blocks until the render thread is idle.
    pub fn wait(&self) {
        drop(self.shared.wait_done());
    }

    pub fn get_tid(&self) -> u32 {
        self.shared.wait_done().tid
    }

    /// Stops the thread after its current frame and releases its GPU objects.
    pub fn destroy(&mut self) -> Result<(), VRError> {
        if self.thread.is_none() {
            return Ok(());
        }
        {
            let mut state = self.shared.lock();
            state.exit = true;
            state.work_available = true;
            self.shared.work_available.notify_one();
        }
        self.join()
    }

    fn join(&mut self) -> Result<(), VRError> {
        match self.thread.take() {
            Some(thread) => thread.join().map_err(|_| VRError::RenderThread("render thread panicked".into())),
            None => Ok(()),
        }
    }
}

impl Drop for VRRenderThread {
    fn drop(&mut self) {
        if let Err(e) = self.destroy() {
            error!("{}", e);
        }
    }
}

#[cfg(all(test, feature = "mock"))]
mod tests {
    use super::*;
    use std::sync::mpsc::channel;
    use std::time::{Duration, Instant};
    use crate::api::mock::{MockCompositor, MockGpu, MockGpuContextFactory, MockGpuState};
    use crate::vr_scene::VRScene;
    use crate::vr_frame_pipeline::VRRenderKind;
    use rust_vrframe_api::{MockVRControlMsg, VRCompositor, VRGpuCapabilities, VRModeParms};

    fn settings() -> VRPipelineSettings {
        VRPipelineSettings {
            num_instances: 16,
            ..VRPipelineSettings::default()
        }
    }

    #[test]
    fn second_submit_waits_for_the_first_frame() {
        let (compositor, remote) = MockCompositor::new_with_remote();
        let session = compositor.enter_vr_mode(&VRModeParms::default()).unwrap();
        let gpu_state = MockGpuState::new_shared(VRGpuCapabilities::default());
        let factory = Box::new(MockGpuContextFactory::new(gpu_state));
        let mut render_thread = VRRenderThread::create(factory, compositor.clone(), settings(), false).unwrap();

        remote.send(MockVRControlMsg::SetSubmitDelay(200)).unwrap();
        // The remote is processed asynchronously.
        while compositor.state_handle().lock().unwrap().submit_delay_ms != 200 {
            thread::sleep(Duration::from_millis(1));
        }

        let start = Instant::now();
        render_thread.submit(VRFrameWork::new(VRRenderKind::LoadingIcon, session, 1, 0.0, 1));
        assert!(start.elapsed() < Duration::from_millis(200));

        let (done_tx, done_rx) = channel();
        let second = VRFrameWork::new(VRRenderKind::LoadingIcon, session, 2, 0.0, 1);
        let submitter = thread::spawn(move || {
            render_thread.submit(second);
            done_tx.send(Instant::now()).unwrap();
            render_thread
        });

        let second_accepted = done_rx.recv().unwrap();
        assert!(second_accepted.duration_since(start) >= Duration::from_millis(200));
        assert!(compositor.state_handle().lock().unwrap().max_concurrent_submits <= 1);

        let mut render_thread = submitter.join().unwrap();
        render_thread.wait();
        render_thread.destroy().unwrap();

        let submissions = compositor.state_handle().lock().unwrap().submissions.clone();
        assert_eq!(submissions.iter().map(|s| s.desc.frame_index).collect::<Vec<_>>(), vec![1, 2]);
    }

    #[test]
    fn destroy_releases_the_render_context() {
        let compositor = Arc::new(MockCompositor::new());
        let gpu_state = MockGpuState::new_shared(VRGpuCapabilities::default());
        let factory = Box::new(MockGpuContextFactory::new(gpu_state.clone()));
        let mut render_thread = VRRenderThread::create(factory, compositor.clone(), settings(), false).unwrap();

        let tid = render_thread.get_tid();
        assert!(tid != 0 && tid != utils::current_thread_id());
        assert_eq!(gpu_state.lock().unwrap().live_render_targets(), 3 * 2);

        render_thread.destroy().unwrap();
        render_thread.destroy().unwrap();
        let state = gpu_state.lock().unwrap();
        assert_eq!(state.live_render_targets(), 0);
        assert_eq!(state.destroyed_contexts.len(), 1);
        assert!(compositor.state_handle().lock().unwrap().submissions.is_empty());
    }

    #[test]
    fn context_failure_is_reported_by_create() {
        let compositor = Arc::new(MockCompositor::new());
        let gpu_state = MockGpuState::new_shared(VRGpuCapabilities::default());
        gpu_state.lock().unwrap().fail_shared_context = true;
        let factory = Box::new(MockGpuContextFactory::new(gpu_state));
        match VRRenderThread::create(factory, compositor, settings(), false) {
            Err(VRError::Gpu(_)) => {},
            Err(e) => panic!("unexpected error: {}", e),
            Ok(_) => panic!("render thread started without a context"),
        }
    }

    #[test]
    fn panic_while_rendering_releases_the_driving_thread() {
        let compositor = Arc::new(MockCompositor::new());
        let session = compositor.enter_vr_mode(&VRModeParms::default()).unwrap();
        let gpu_state = MockGpuState::new_shared(VRGpuCapabilities::default());
        let main = MockGpu::with_state(gpu_state.clone());
        let scene = Arc::new(VRScene::create(&main, &settings(), false).unwrap());

        let factory = Box::new(MockGpuContextFactory::new(gpu_state.clone()));
        let mut render_thread = VRRenderThread::create(factory, compositor.clone(), settings(), false).unwrap();
        gpu_state.lock().unwrap().panic_on_draw = true;

        let mut work = VRFrameWork::new(VRRenderKind::Frame, session, 2, 0.0, 1);
        work.scene = Some(scene.clone());
        render_thread.submit(work);
        render_thread.wait();

        // Dropped, not queued behind a thread that is gone.
        render_thread.submit(VRFrameWork::new(VRRenderKind::BlackFinal, session, 2, 0.0, 1));
        render_thread.wait();
        match render_thread.destroy() {
            Err(VRError::RenderThread(_)) => {},
            other => panic!("unexpected destroy result: {:?}", other),
        }
        assert!(compositor.state_handle().lock().unwrap().submissions.is_empty());

        // The frame work went away with the unwinding thread.
        match Arc::try_unwrap(scene) {
            Ok(mut scene) => scene.destroy(&main),
            Err(_) => panic!("scene still referenced by the render thread"),
        }
    }
}
