use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use crate::client::{ClientError, TodoApi};
use crate::domain::todo::TodoId;
use crate::view::{Command, Intent, Notice, Request, Response, TodoView};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    Editing,
}

struct Settled {
    command: Command,
    result: Result<Response, ClientError>,
}

/// Owns the view; request results are applied on the UI thread in [`App::poll`].
pub struct App {
    api: Arc<dyn TodoApi>,
    runtime: Handle,
    settled_tx: UnboundedSender<Settled>,
    settled_rx: UnboundedReceiver<Settled>,
    view: TodoView,
    pub selected: usize,
    pub mode: InputMode,
    pub status: Option<Notice>,
}

impl App {
    pub fn new(api: Arc<dyn TodoApi>, runtime: Handle) -> Self {
        let (settled_tx, settled_rx) = mpsc::unbounded_channel();
        let mut app = Self {
            api,
            runtime,
            settled_tx,
            settled_rx,
            view: TodoView::default(),
            selected: 0,
            mode: InputMode::Normal,
            status: None,
        };
        app.dispatch(Intent::Load);
        app
    }

    pub fn view(&self) -> &TodoView {
        &self.view
    }

    /// Returns whether a request went out.
    pub fn dispatch(&mut self, intent: Intent) -> bool {
        let (view, command) = std::mem::take(&mut self.view).apply(intent);
        self.view = view;
        let sent = command.is_some();
        if let Some(command) = command {
            self.send(command);
        }
        self.clamp_selection();
        sent
    }

    /// Applies every request that has finished since the last call.
    pub fn poll(&mut self) {
        while let Ok(settled) = self.settled_rx.try_recv() {
            self.settle(settled);
        }
    }

    fn send(&self, command: Command) {
        let api = Arc::clone(&self.api);
        let tx = self.settled_tx.clone();
        tracing::debug!(request = ?command.request, "sending request");
        self.runtime.spawn(async move {
            let result = perform(api.as_ref(), &command.request).await;
            if tx.send(Settled { command, result }).is_err() {
                tracing::debug!("view closed before request settled");
            }
        });
    }

    fn settle(&mut self, Settled { command, result }: Settled) {
        if let Err(error) = &result {
            tracing::warn!(%error, request = ?command.request, "request failed");
        }
        let (view, notice) = std::mem::take(&mut self.view).settle(command, result);
        self.view = view;
        match notice {
            Some(notice) => self.status = Some(notice),
            // A quiet settle (a successful load) retires any progress hint.
            None => {
                if matches!(self.status, Some(Notice::Info(_))) {
                    self.status = None;
                }
            }
        }
        self.clamp_selection();
    }

    fn clamp_selection(&mut self) {
        let len = self.view.todos().len();
        if self.selected >= len {
            self.selected = len.saturating_sub(1);
        }
    }

    pub fn select_next(&mut self) {
        let len = self.view.todos().len();
        if len > 0 {
            self.selected = (self.selected + 1).min(len - 1);
        }
    }

    pub fn select_previous(&mut self) {
        if self.selected > 0 {
            self.selected -= 1;
        }
    }

    fn selected_id(&self) -> Option<TodoId> {
        self.view.todos().get(self.selected).map(|t| t.id)
    }

    pub fn toggle_selected(&mut self) {
        if let Some(id) = self.selected_id() {
            self.dispatch(Intent::Toggle(id));
        }
    }

    pub fn delete_selected(&mut self) {
        if let Some(id) = self.selected_id() {
            self.dispatch(Intent::Delete(id));
        }
    }

    pub fn reload(&mut self) {
        if self.dispatch(Intent::Load) {
            self.set_status("Reloading");
        }
    }

    pub fn start_editing(&mut self) {
        self.mode = InputMode::Editing;
        self.set_status("Type new task and press Enter");
    }

    pub fn cancel_editing(&mut self) {
        self.mode = InputMode::Normal;
        self.dispatch(Intent::Edit(String::new()));
        self.set_status("Canceled");
    }

    pub fn push_char(&mut self, c: char) {
        let mut draft = self.view.draft().to_owned();
        draft.push(c);
        self.dispatch(Intent::Edit(draft));
    }

    pub fn pop_char(&mut self) {
        let mut draft = self.view.draft().to_owned();
        draft.pop();
        self.dispatch(Intent::Edit(draft));
    }

    pub fn add_todo(&mut self) {
        if self.view.draft().trim().is_empty() {
            self.set_status("Cannot add an empty task");
            return;
        }
        if self.view.is_adding() {
            return;
        }
        self.dispatch(Intent::Add);
        self.mode = InputMode::Normal;
        self.selected = 0;
        self.set_status("Adding...");
    }

    pub fn set_status(&mut self, msg: &str) {
        self.status = Some(Notice::Info(msg.to_string()));
    }

    #[cfg(test)]
    async fn settle_next(&mut self) {
        if let Some(settled) = self.settled_rx.recv().await {
            self.settle(settled);
        }
    }
}

async fn perform(api: &dyn TodoApi, request: &Request) -> Result<Response, ClientError> {
    match request {
        Request::List => api.list().await.map(Response::Listed),
        Request::Create { task } => api.create(task).await.map(Response::Created),
        Request::Update { id, completed } => {
            api.update(*id, *completed).await.map(Response::Updated)
        }
        Request::Delete { id } => api.delete(*id).await.map(|_| Response::Deleted),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::domain::todo::Todo;
    use crate::repo::TodoRepository;
    use crate::repo::memory::InMemoryTodoRepo;
    use crate::view::{DELETE_FAILED, UPDATE_FAILED};

    #[derive(Default)]
    struct FakeApi {
        repo: Mutex<InMemoryTodoRepo>,
        failing: AtomicBool,
        mutations: AtomicUsize,
    }

    impl FakeApi {
        fn seeded(tasks: &[&str]) -> Arc<Self> {
            Arc::new(Self {
                repo: Mutex::new(InMemoryTodoRepo::with_seed(tasks.iter().copied())),
                ..Self::default()
            })
        }

        fn fail(&self, on: bool) {
            self.failing.store(on, Ordering::SeqCst);
        }

        fn mutate<T>(
            &self,
            f: impl FnOnce(&mut InMemoryTodoRepo) -> crate::repo::RepoResult<T>,
        ) -> Result<T, ClientError> {
            self.mutations.fetch_add(1, Ordering::SeqCst);
            if self.failing.load(Ordering::SeqCst) {
                return Err(ClientError::Server {
                    status: 500,
                    message: "forced".into(),
                });
            }
            f(&mut self.repo.lock().unwrap()).map_err(|e| ClientError::Server {
                status: 500,
                message: e.to_string(),
            })
        }

        fn stored(&self) -> Vec<Todo> {
            self.repo.lock().unwrap().all().unwrap()
        }
    }

    #[async_trait]
    impl TodoApi for FakeApi {
        async fn list(&self) -> Result<Vec<Todo>, ClientError> {
            Ok(self.stored())
        }

        async fn create(&self, task: &str) -> Result<Todo, ClientError> {
            self.mutate(|repo| repo.create(task.to_string()))
        }

        async fn update(&self, id: TodoId, completed: bool) -> Result<Todo, ClientError> {
            self.mutate(|repo| repo.set_completed(id, completed))
        }

        async fn delete(&self, id: TodoId) -> Result<String, ClientError> {
            self.mutate(|repo| repo.delete(id))
                .map(|_| "Todo deleted successfully".to_string())
        }
    }

    async fn started(api: Arc<FakeApi>) -> App {
        let mut app = App::new(api, Handle::current());
        assert!(app.view().is_loading());
        app.settle_next().await;
        assert!(!app.view().is_loading());
        app
    }

    #[tokio::test]
    async fn initial_load_fills_the_cache() {
        let app = started(FakeApi::seeded(&["a", "b"])).await;
        let ids: Vec<TodoId> = app.view().todos().iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![2, 1]);
    }

    #[tokio::test]
    async fn add_prepends_and_returns_to_normal_mode() {
        let api = FakeApi::seeded(&["a"]);
        let mut app = started(api.clone()).await;

        app.start_editing();
        for c in "Buy milk".chars() {
            app.push_char(c);
        }
        app.add_todo();
        assert_eq!(app.mode, InputMode::Normal);
        app.add_todo();
        app.settle_next().await;

        assert_eq!(app.view().todos()[0].task, "Buy milk");
        assert_eq!(app.view().draft(), "");
        assert_eq!(api.mutations.load(Ordering::SeqCst), 1);
        assert_eq!(api.stored().len(), 2);
    }

    #[tokio::test]
    async fn empty_add_sends_nothing() {
        let api = FakeApi::seeded(&[]);
        let mut app = started(api.clone()).await;
        app.start_editing();
        app.add_todo();
        assert_eq!(app.mode, InputMode::Editing);
        assert_eq!(
            app.status,
            Some(Notice::Info("Cannot add an empty task".into()))
        );
        assert_eq!(api.mutations.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn toggle_flips_before_the_response_and_reverts_on_failure() {
        let api = FakeApi::seeded(&["a"]);
        let mut app = started(api.clone()).await;
        api.fail(true);

        app.toggle_selected();
        assert!(app.view().todos()[0].completed);
        app.toggle_selected();

        app.settle_next().await;
        assert!(!app.view().todos()[0].completed);
        assert_eq!(app.status, Some(Notice::Failure(UPDATE_FAILED.into())));
        assert_eq!(api.mutations.load(Ordering::SeqCst), 1);
        assert!(!api.stored()[0].completed);
    }

    #[tokio::test]
    async fn toggle_success_reaches_the_store() {
        let api = FakeApi::seeded(&["a"]);
        let mut app = started(api.clone()).await;

        app.toggle_selected();
        app.settle_next().await;
        assert!(app.view().todos()[0].completed);
        assert!(api.stored()[0].completed);
        assert!(!app.view().is_in_flight(1));
    }

    #[tokio::test]
    async fn delete_removes_immediately_and_reinserts_on_failure() {
        let api = FakeApi::seeded(&["a", "b"]);
        let mut app = started(api.clone()).await;
        api.fail(true);

        app.delete_selected();
        assert_eq!(app.view().todos().len(), 1);
        app.settle_next().await;

        let ids: Vec<TodoId> = app.view().todos().iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![2, 1]);
        assert_eq!(app.status, Some(Notice::Failure(DELETE_FAILED.into())));
        assert_eq!(api.stored().len(), 2);
    }

    #[tokio::test]
    async fn reload_status_clears_once_loaded() {
        let api = FakeApi::seeded(&["a"]);
        let mut app = App::new(api, Handle::current());

        app.reload();
        assert_eq!(app.status, None);

        app.settle_next().await;
        app.reload();
        assert_eq!(app.status, Some(Notice::Info("Reloading".into())));
        app.settle_next().await;
        assert_eq!(app.status, None);
    }

    #[tokio::test]
    async fn selection_stays_in_bounds_after_delete() {
        let api = FakeApi::seeded(&["a", "b"]);
        let mut app = started(api.clone()).await;
        app.select_next();
        assert_eq!(app.selected, 1);

        app.delete_selected();
        assert_eq!(app.selected, 0);
        app.settle_next().await;
        assert_eq!(api.stored().len(), 1);
    }
}
