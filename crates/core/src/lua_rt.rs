use std::path::Path;
use std::time::Duration;

use anyhow::{Result, anyhow, bail};
use mlua::prelude::*;
use mlua::SerializeOptions;

use crate::command::Command;
use crate::heuristic::{BotProfile, Heuristic};
use crate::snapshot::Snapshot;
use crate::logger;

const DEFAULT_INTERVAL_SECS: f64 = 5.0;

/// Metadata a bot script declares next to its `decide` function.
#[derive(Debug, Clone, PartialEq)]
pub struct LuaMeta {
    pub description: String,
    pub interval: Duration,
    /// `None` runs until stopped, which is also what `math.huge` means.
    pub duration: Option<Duration>,
}

impl LuaMeta {
    pub fn profile(&self, name: &str) -> BotProfile {
        BotProfile {
            name: name.to_string(),
            description: self.description.clone(),
            interval: self.interval,
            duration: self.duration,
        }
    }
}

fn interval_from(secs: Option<f64>) -> Result<Duration> {
    let secs = secs.unwrap_or(DEFAULT_INTERVAL_SECS);
    match Duration::try_from_secs_f64(secs) {
        Ok(d) if !d.is_zero() => Ok(d),
        _ => bail!("interval must be a positive number of seconds, got {}", secs),
    }
}

fn duration_from(secs: Option<f64>) -> Result<Option<Duration>> {
    match secs {
        None => Ok(None),
        Some(s) if s == f64::INFINITY => Ok(None),
        Some(s) => Duration::try_from_secs_f64(s)
            .map(Some)
            .map_err(|_| anyhow!("duration must be a non-negative number of seconds, got {}", s)),
    }
}

/// Prefix for lines a script logs itself, kept apart from the loop's own.
pub fn script_prefix(tag: &str) -> String {
    format!("{}.lua", tag)
}

/// A heuristic written in Lua, owning its own VM.
pub struct LuaBot {
    lua: Lua,
    bot_key: LuaRegistryKey,
    tag: String,
}

/// Helper to convert mlua::Error -> anyhow::Error
fn lua_err(e: mlua::Error) -> anyhow::Error {
    anyhow!("{}", e)
}

/// Evaluate `main.lua` with `require()` resolving inside the bot's directory.
fn load_table(lua: &Lua, path: &Path) -> Result<LuaTable> {
    if let Some(bot_dir) = path.parent() {
        let dir_str = bot_dir.to_string_lossy();
        let pkg: LuaTable = lua.globals().get("package").map_err(lua_err)?;
        pkg.set("path", format!("{}/?.lua;{}/?/init.lua", dir_str, dir_str)).map_err(lua_err)?;
    }

    let code = std::fs::read_to_string(path)?;
    let table: LuaTable = lua
        .load(&code)
        .set_name(path.to_string_lossy())
        .eval()
        .map_err(lua_err)?;

    // A bot without decide() is not a bot
    let _: LuaFunction = table.get("decide").map_err(|e| anyhow!("missing decide(): {}", e))?;
    Ok(table)
}

impl LuaBot {
    /// Load a bot script just to read its metadata. Does not call start().
    pub fn load_meta(path: &Path) -> Result<LuaMeta> {
        let lua = Lua::new();
        register_globals(&lua, "").map_err(lua_err)?;
        let table = load_table(&lua, path)?;

        Ok(LuaMeta {
            description: table.get::<Option<String>>("description").map_err(lua_err)?.unwrap_or_default(),
            interval: interval_from(table.get("interval").map_err(lua_err)?)?,
            duration: duration_from(table.get("duration").map_err(lua_err)?)?,
        })
    }

    /// Load the script and call its optional start().
    pub fn new(script_path: &Path, tag: &str) -> Result<Self> {
        let lua = Lua::new();
        register_globals(&lua, tag).map_err(lua_err)?;
        let table = load_table(&lua, script_path)?;

        if let Ok(start_fn) = table.get::<LuaFunction>("start") {
            start_fn.call::<()>(()).map_err(lua_err)?;
        }

        let bot_key = lua.create_registry_value(table).map_err(lua_err)?;
        Ok(Self { lua, bot_key, tag: tag.to_string() })
    }

    /// Call decide(snapshot) and parse what it returns: nil, one command
    /// table, or a list of them.
    pub fn try_decide(&self, snapshot: &Snapshot) -> Result<Vec<Command>> {
        let table: LuaTable = self.lua.registry_value(&self.bot_key).map_err(lua_err)?;
        let decide: LuaFunction = table.get("decide").map_err(lua_err)?;

        let opts = SerializeOptions::new()
            .serialize_none_to_null(false)
            .serialize_unit_to_null(false);
        let arg = self.lua.to_value_with(snapshot, opts).map_err(lua_err)?;
        let result: LuaValue = decide.call(arg).map_err(lua_err)?;

        let table = match result {
            LuaValue::Nil => return Ok(Vec::new()),
            LuaValue::Table(t) => t,
            other => return Err(anyhow!("decide() returned a {}", other.type_name())),
        };
        if table.contains_key("type").map_err(lua_err)? {
            let cmd: Command = self.lua.from_value(LuaValue::Table(table)).map_err(lua_err)?;
            return Ok(vec![cmd]);
        }
        if table.is_empty() {
            return Ok(Vec::new());
        }
        self.lua.from_value(LuaValue::Table(table)).map_err(lua_err)
    }

    /// Call the script's optional stop().
    pub fn try_stop(&mut self) -> Result<()> {
        let table: LuaTable = self.lua.registry_value(&self.bot_key).map_err(lua_err)?;
        if let Ok(f) = table.get::<LuaFunction>("stop") {
            f.call::<()>(()).map_err(lua_err)?;
        }
        Ok(())
    }
}

impl Heuristic for LuaBot {
    /// Script errors cost one tick, not the loop.
    fn decide(&mut self, snapshot: &Snapshot) -> Vec<Command> {
        match self.try_decide(snapshot) {
            Ok(batch) => batch,
            Err(e) => {
                logger::error_p(&self.tag, &format!("decide failed: {}", e));
                Vec::new()
            }
        }
    }

    fn stop(&mut self) {
        if let Err(e) = self.try_stop() {
            logger::error_p(&self.tag, &format!("stop failed: {}", e));
        }
    }
}

/// Register the F.* global table into a Lua state.
fn register_globals(lua: &Lua, tag: &str) -> mlua::Result<()> {
    let f_table = lua.create_table()?;

    // F.log(msg) and F.warn(msg), under the script prefix in blue
    let tag = script_prefix(tag);
    logger::register_prefix(&tag, logger::COLOR_BLUE);
    let info_tag = tag.clone();
    let log_fn = lua.create_function(move |_, msg: String| {
        logger::info_p(&info_tag, &msg);
        Ok(())
    })?;
    f_table.set("log", log_fn)?;

    let warn_fn = lua.create_function(move |_, msg: String| {
        logger::warn_p(&tag, &msg);
        Ok(())
    })?;
    f_table.set("warn", warn_fn)?;

    lua.globals().set("F", f_table)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::PathBuf;

    use super::*;

    fn script(name: &str, body: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("snapbridge-lua-{}-{}", name, std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("main.lua");
        fs::write(&path, body).unwrap();
        path
    }

    fn snap(text: &str) -> Snapshot {
        Snapshot::from_json_str(text).unwrap()
    }

    const GUARD: &str = r#"
        return {
            description = "heal when low",
            interval = 2,
            duration = 300,
            decide = function(s)
                if s.health and s.health.current and s.health.current < 200 then
                    return { { type = "key_press", key = "VK_X", delayMs = 0 } }
                end
                return {}
            end,
        }
    "#;

    #[test]
    fn meta_is_read_without_start() {
        let path = script("meta", GUARD);
        let meta = LuaBot::load_meta(&path).unwrap();
        assert_eq!(meta.description, "heal when low");
        let profile = meta.profile("guard");
        assert_eq!(profile.interval, Duration::from_secs(2));
        assert_eq!(profile.duration, Some(Duration::from_secs(300)));
    }

    #[test]
    fn decide_sees_typed_snapshot() {
        let path = script("decide", GUARD);
        let mut bot = LuaBot::new(&path, "guard").unwrap();
        let low = snap(r#"{"Health": {"Current": 150, "Max": 500, "Confidence": 0.9}}"#);
        let high = snap(r#"{"Health": {"Current": 300, "Max": 500, "Confidence": 0.9}}"#);
        assert_eq!(bot.decide(&low), vec![Command::key_press("VK_X", 0)]);
        assert!(bot.decide(&high).is_empty());
        assert!(bot.decide(&snap("{}")).is_empty());
    }

    #[test]
    fn single_command_and_raw_fields() {
        let path = script("single", r#"
            return {
                decide = function(s)
                    if s.raw.Zone == "bazaar" then
                        return { type = "click", x = 10, y = 20, delayMs = 5 }
                    end
                end,
            }
        "#);
        let mut bot = LuaBot::new(&path, "single").unwrap();
        assert_eq!(bot.decide(&snap(r#"{"Zone": "bazaar"}"#)), vec![Command::click(10, 20, 5)]);
        assert!(bot.decide(&snap(r#"{"Zone": "commons"}"#)).is_empty());
    }

    #[test]
    fn bad_command_costs_one_tick() {
        let path = script("bad", r#"
            return { decide = function(s) return { { type = "teleport" } } end }
        "#);
        let mut bot = LuaBot::new(&path, "bad").unwrap();
        assert!(bot.try_decide(&snap("{}")).is_err());
        assert!(bot.decide(&snap("{}")).is_empty());
    }

    #[test]
    fn unbounded_duration_runs_forever() {
        let path = script("huge", r#"
            return { interval = 0.5, duration = math.huge, decide = function(s) end }
        "#);
        let profile = LuaBot::load_meta(&path).unwrap().profile("huge");
        assert_eq!(profile.interval, Duration::from_millis(500));
        assert_eq!(profile.duration, None);
    }

    #[test]
    fn unusable_timing_is_rejected() {
        for (name, fields) in [
            ("zero", "interval = 0"),
            ("negative", "interval = -1"),
            ("nan", "interval = 0/0"),
            ("inf", "interval = math.huge"),
            ("backwards", "duration = -5"),
            ("nan-duration", "duration = 0/0"),
        ] {
            let body = format!("return {{ {}, decide = function(s) end }}", fields);
            let path = script(&format!("timing-{}", name), &body);
            assert!(LuaBot::load_meta(&path).is_err(), "{fields}");
        }
    }

    #[test]
    fn stop_hook_runs_when_loop_is_dropped() {
        let path = script("stop", r#"
            return {
                decide = function(s) return {} end,
                stop = function()
                    local f = assert(io.open(MARKER, "w"))
                    f:write("stopped")
                    f:close()
                end,
            }
        "#);
        let marker = path.with_file_name("stopped.txt");
        fs::remove_file(&marker).ok();
        let body = fs::read_to_string(&path).unwrap();
        fs::write(&path, format!("MARKER = {:?}\n{}", marker.to_string_lossy(), body)).unwrap();

        let bot: Box<dyn Heuristic> = Box::new(LuaBot::new(&path, "stopper").unwrap());
        let paths = crate::bridge::BridgePaths {
            snapshot: path.with_file_name("snapshot.json"),
            commands: path.with_file_name("commands.json"),
        };
        fs::write(&paths.snapshot, "{}").unwrap();
        let mut bridge = crate::bridge::BridgeLoop::new(paths, BotProfile::new("stopper", "", 5, None), bot);
        bridge.tick().unwrap();
        assert!(!marker.exists());
        drop(bridge);
        assert_eq!(fs::read_to_string(&marker).unwrap(), "stopped");
    }

    #[test]
    fn script_logs_use_their_own_prefix() {
        assert_eq!(script_prefix("guard"), "guard.lua");
        assert_ne!(script_prefix("guard"), "guard");
    }

    #[test]
    fn script_without_decide_is_rejected() {
        let path = script("nodecide", r#"return { description = "x" }"#);
        assert!(LuaBot::load_meta(&path).is_err());
    }
}
