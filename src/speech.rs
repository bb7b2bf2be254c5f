// ============================================
// src/speech.rs
// 日本語の読み上げ (外部の音声合成コマンドを使う)
// ============================================

use std::env;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};

/// 読み上げの言語タグ
pub const SPEECH_LANG: &str = "ja-JP";
pub const DEFAULT_RATE: f32 = 0.8;
pub const DEFAULT_VOLUME: f32 = 0.8;

/// 読み上げ1回分の指定
#[derive(Debug, Clone, PartialEq)]
pub struct Utterance {
    pub text: String,
    pub lang: &'static str,
    /// 1.0 が標準速度
    pub rate: f32,
    /// 0.0〜1.0
    pub volume: f32,
}

impl Utterance {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            lang: SPEECH_LANG,
            rate: DEFAULT_RATE,
            volume: DEFAULT_VOLUME,
        }
    }

    pub fn with_rate(mut self, rate: f32) -> Self {
        self.rate = rate;
        self
    }

    pub fn with_volume(mut self, volume: f32) -> Self {
        self.volume = volume.clamp(0.0, 1.0);
        self
    }
}

/// 音声合成の実装
pub trait Speaker {
    /// 読み上げが使えるか (使えなければ読み上げボタンを出さない)
    fn is_supported(&self) -> bool;

    /// 再生中の読み上げを止めてから読み上げる。結果は待たない
    fn speak(&mut self, utterance: &Utterance);

    fn cancel(&mut self);

    /// 再生中なら true
    fn is_speaking(&mut self) -> bool;
}

/// 読み上げ機能が無い環境用
#[derive(Debug, Default)]
pub struct NullSpeaker;

impl Speaker for NullSpeaker {
    fn is_supported(&self) -> bool {
        false
    }

    fn speak(&mut self, _utterance: &Utterance) {}

    fn cancel(&mut self) {}

    fn is_speaking(&mut self) -> bool {
        false
    }
}

/// 対応している音声合成コマンド
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    EspeakNg,
    Espeak,
    /// macOS の say
    Say,
}

impl Backend {
    const SEARCH_ORDER: [Backend; 3] = [Backend::EspeakNg, Backend::Espeak, Backend::Say];

    fn program(self) -> &'static str {
        match self {
            Backend::EspeakNg => "espeak-ng",
            Backend::Espeak => "espeak",
            Backend::Say => "say",
        }
    }

    fn from_program(path: &Path) -> Option<Self> {
        let name = path.file_stem()?.to_str()?;
        Self::SEARCH_ORDER.into_iter().find(|b| b.program() == name)
    }

    /// コマンドライン引数を組み立てる
    pub fn args(self, utterance: &Utterance) -> Vec<String> {
        // espeak の標準は 175 語/分、say は 175〜200 語/分
        let words_per_minute = (175.0 * utterance.rate).round() as u32;
        match self {
            Backend::EspeakNg | Backend::Espeak => vec![
                "-v".to_string(),
                "ja".to_string(),
                "-s".to_string(),
                words_per_minute.to_string(),
                "-a".to_string(),
                ((utterance.volume * 100.0).round() as u32).to_string(),
                utterance.text.clone(),
            ],
            Backend::Say => vec![
                "-v".to_string(),
                "Kyoko".to_string(),
                "-r".to_string(),
                words_per_minute.to_string(),
                utterance.text.clone(),
            ],
        }
    }
}

/// 外部コマンドで読み上げる
#[derive(Debug)]
pub struct CommandSpeaker {
    program: PathBuf,
    backend: Backend,
    child: Option<Child>,
}

impl CommandSpeaker {
    pub fn new(program: PathBuf, backend: Backend) -> Self {
        Self {
            program,
            backend,
            child: None,
        }
    }
}

impl Speaker for CommandSpeaker {
    fn is_supported(&self) -> bool {
        true
    }

    fn speak(&mut self, utterance: &Utterance) {
        self.cancel();
        let spawned = Command::new(&self.program)
            .args(self.backend.args(utterance))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn();
        match spawned {
            Ok(child) => {
                tracing::debug!(text = %utterance.text, "speaking");
                self.child = Some(child);
            }
            Err(err) => {
                tracing::warn!(program = %self.program.display(), error = %err, "failed to start speech");
            }
        }
    }

    fn cancel(&mut self) {
        if let Some(mut child) = self.child.take() {
            // 終了済みなら kill は失敗するが問題ない
            let _ = child.kill();
            let _ = child.wait();
        }
    }

    /// 子プロセスの終了を見て判定する
    fn is_speaking(&mut self) -> bool {
        let finished = match self.child.as_mut() {
            None => return false,
            Some(child) => !matches!(child.try_wait(), Ok(None)),
        };
        if finished {
            self.child = None;
        }
        !finished
    }
}

impl Drop for CommandSpeaker {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// PATH から実行ファイルを探す
fn find_in_path(program: &str) -> Option<PathBuf> {
    let paths = env::var_os("PATH")?;
    env::split_paths(&paths)
        .map(|dir| dir.join(program))
        .find(|candidate| candidate.is_file())
}

/// MARK:起動時に一度だけ読み上げ機能を探す
///
/// `command` が指定されていればそれを使い、無ければ
/// espeak-ng → espeak → say の順に PATH から探す。
pub fn detect(enabled: bool, command: Option<&Path>) -> Box<dyn Speaker> {
    if !enabled {
        tracing::info!("speech disabled by config");
        return Box::new(NullSpeaker);
    }

    if let Some(command) = command {
        let resolved = if command.components().count() > 1 {
            Some(command.to_path_buf()).filter(|p| p.is_file())
        } else {
            command.to_str().and_then(find_in_path)
        };
        match (resolved, Backend::from_program(command)) {
            (Some(program), Some(backend)) => {
                tracing::info!(program = %program.display(), "using configured speech command");
                return Box::new(CommandSpeaker::new(program, backend));
            }
            _ => {
                tracing::warn!(command = %command.display(), "configured speech command is unavailable");
                return Box::new(NullSpeaker);
            }
        }
    }

    for backend in Backend::SEARCH_ORDER {
        if let Some(program) = find_in_path(backend.program()) {
            tracing::info!(program = %program.display(), "speech backend found");
            return Box::new(CommandSpeaker::new(program, backend));
        }
    }
    tracing::info!("no speech backend found, audio is hidden");
    Box::new(NullSpeaker)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn utterance_defaults_to_japanese() {
        let u = Utterance::new("水");
        assert_eq!(u.lang, "ja-JP");
        assert_eq!(u.rate, 0.8);
        assert_eq!(u.volume, 0.8);
        assert_eq!(Utterance::new("水").with_volume(3.0).volume, 1.0);
    }

    #[test]
    fn espeak_args_carry_voice_rate_and_volume() {
        let args = Backend::EspeakNg.args(&Utterance::new("こんにちは"));
        assert_eq!(args, vec!["-v", "ja", "-s", "140", "-a", "80", "こんにちは"]);
    }

    #[test]
    fn say_args_use_japanese_voice() {
        let args = Backend::Say.args(&Utterance::new("水").with_rate(1.0));
        assert_eq!(args, vec!["-v", "Kyoko", "-r", "175", "水"]);
    }

    #[test]
    fn backend_is_recognised_from_program_path() {
        assert_eq!(Backend::from_program(Path::new("/usr/bin/espeak-ng")), Some(Backend::EspeakNg));
        assert_eq!(Backend::from_program(Path::new("say")), Some(Backend::Say));
        assert_eq!(Backend::from_program(Path::new("festival")), None);
    }

    #[test]
    fn disabled_speech_is_unsupported() {
        let speaker = detect(false, None);
        assert!(!speaker.is_supported());
    }

    /// `sleep` するだけの偽の espeak を置く
    #[cfg(unix)]
    fn fake_espeak(dir: &Path) -> PathBuf {
        use std::fs;
        use std::os::unix::fs::PermissionsExt;

        let script = dir.join("espeak");
        fs::write(&script, "#!/bin/sh\nsleep 0.3\n").unwrap();
        fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).unwrap();
        script
    }

    #[cfg(unix)]
    fn child_id(speaker: &CommandSpeaker) -> Option<u32> {
        speaker.child.as_ref().map(Child::id)
    }

    #[cfg(unix)]
    #[test]
    fn command_speaker_replaces_child_and_sees_it_finish() {
        use std::thread;
        use std::time::{Duration, Instant};

        let dir = tempfile::TempDir::new().unwrap();
        let mut speaker = CommandSpeaker::new(fake_espeak(dir.path()), Backend::Espeak);
        assert!(speaker.is_supported());

        speaker.speak(&Utterance::new("水"));
        assert!(speaker.is_speaking());
        let first = child_id(&speaker).unwrap();

        // 再生中に読み上げると前のプロセスは止めて置き換える
        speaker.speak(&Utterance::new("火"));
        assert!(speaker.is_speaking());
        let second = child_id(&speaker).unwrap();
        assert_ne!(first, second);

        let deadline = Instant::now() + Duration::from_secs(5);
        while speaker.is_speaking() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(20));
        }
        assert!(!speaker.is_speaking());
        assert!(child_id(&speaker).is_none());
    }

    #[cfg(unix)]
    #[test]
    fn cancel_stops_speaking() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut speaker = CommandSpeaker::new(fake_espeak(dir.path()), Backend::Espeak);
        speaker.speak(&Utterance::new("水"));
        assert!(speaker.is_speaking());

        speaker.cancel();
        assert!(!speaker.is_speaking());
    }

    #[cfg(unix)]
    #[test]
    fn configured_command_path_is_used() {
        let dir = tempfile::TempDir::new().unwrap();
        let script = fake_espeak(dir.path());
        assert!(detect(true, Some(&script)).is_supported());
        assert!(!detect(true, Some(&dir.path().join("say"))).is_supported());
    }

    #[test]
    fn null_speaker_never_speaks() {
        let mut speaker = NullSpeaker;
        speaker.speak(&Utterance::new("水"));
        assert!(!speaker.is_speaking());
    }
}
